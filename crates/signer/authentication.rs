use rb_jsonrpc::RpcErr;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks the `X-API-Key` header against the signer's configured key, when
/// one is configured. A signer started without `--api-key` accepts any
/// request (development mode).
pub fn authenticate(configured: &Option<String>, header_value: Option<&str>) -> Result<(), RpcErr> {
    let Some(expected) = configured else {
        return Ok(());
    };
    match header_value {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(RpcErr::Unauthorized("invalid X-API-Key".to_string())),
        None => Err(RpcErr::Unauthorized("missing X-API-Key header".to_string())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_any_request_when_unconfigured() {
        assert!(authenticate(&None, None).is_ok());
    }

    #[test]
    fn rejects_missing_header_when_configured() {
        let err = authenticate(&Some("secret".to_string()), None).unwrap_err();
        assert!(matches!(err, RpcErr::Unauthorized(_)));
    }

    #[test]
    fn rejects_wrong_key() {
        let err = authenticate(&Some("secret".to_string()), Some("wrong")).unwrap_err();
        assert!(matches!(err, RpcErr::Unauthorized(_)));
    }

    #[test]
    fn accepts_matching_key() {
        assert!(authenticate(&Some("secret".to_string()), Some("secret")).is_ok());
    }
}
