// SPDX-License-Identifier: MIT

use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use url::Url;

use crate::domain::error::AppError;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        Ok(RootProvider::new_http(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(
            ConnectionFactory::http("not a url"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn accepts_http_url() {
        assert!(ConnectionFactory::http("http://localhost:8545").is_ok());
    }
}
