use crate::extractors::RejectionType;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use log::*;
use service::config::ApiVersion;

/// Requires an `x-version` header naming a supported API version.
#[derive(Debug)]
pub(crate) struct CompareApiVersion(pub String);

impl<S> FromRequestParts<S> for CompareApiVersion
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let version = parts
            .headers
            .get(ApiVersion::field_name())
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Missing {} header", ApiVersion::field_name()),
                )
            })?;

        if !ApiVersion::versions().contains(&version) {
            warn!("Request for unsupported API version {version}");
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported API version {version}"),
            ));
        }

        Ok(CompareApiVersion(version.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<CompareApiVersion, RejectionType> {
        let (mut parts, _) = request.into_parts();
        CompareApiVersion::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn current_version_is_accepted() {
        let request = Request::builder()
            .header(ApiVersion::field_name(), ApiVersion::default_version())
            .body(())
            .unwrap();

        let CompareApiVersion(version) = extract(request).await.unwrap();
        assert_eq!(version, ApiVersion::default_version());
    }

    #[tokio::test]
    async fn missing_or_unknown_version_is_bad_request() {
        let missing = Request::builder().body(()).unwrap();
        let unknown = Request::builder()
            .header(ApiVersion::field_name(), "0.0.1")
            .body(())
            .unwrap();

        assert_eq!(extract(missing).await.unwrap_err().0, StatusCode::BAD_REQUEST);
        assert_eq!(extract(unknown).await.unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
