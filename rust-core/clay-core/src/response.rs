//! # Replies
//!
//! What a handler produces: a status with an optional JSON body, or a
//! redirect. The dispatcher writes either onto the host context.

use serde::Serialize;
use serde_json::Value;

/// Status codes a redirect may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(into = "u16")]
pub enum RedirectStatus {
    /// 300
    MultipleChoices,
    /// 301
    MovedPermanently,
    /// 302
    Found,
    /// 303
    #[default]
    SeeOther,
    /// 304
    NotModified,
    /// 307
    TemporaryRedirect,
    /// 308
    PermanentRedirect,
}

impl RedirectStatus {
    /// Numeric status code
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::MultipleChoices => 300,
            Self::MovedPermanently => 301,
            Self::Found => 302,
            Self::SeeOther => 303,
            Self::NotModified => 304,
            Self::TemporaryRedirect => 307,
            Self::PermanentRedirect => 308,
        }
    }

    /// Map a numeric code back to a redirect status
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            300 => Self::MultipleChoices,
            301 => Self::MovedPermanently,
            302 => Self::Found,
            303 => Self::SeeOther,
            304 => Self::NotModified,
            307 => Self::TemporaryRedirect,
            308 => Self::PermanentRedirect,
            _ => return None,
        })
    }
}

impl From<RedirectStatus> for u16 {
    fn from(status: RedirectStatus) -> Self {
        status.code()
    }
}

/// A status plus optional JSON body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Response {
    /// A bodyless response with the given status
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// A `200` response with a JSON body
    #[must_use]
    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(200).with_body(body)
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A redirect to another location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    /// Redirect status
    pub status: RedirectStatus,
    /// Target URL, sent as the `Location` header
    pub url: String,
}

/// Anything a handler can answer with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Status and body
    Response(Response),
    /// Redirect
    Redirect(Redirect),
}

impl Reply {
    /// Numeric status of either variant
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Response(res) => res.status,
            Self::Redirect(redirect) => redirect.status.code(),
        }
    }

    /// Body, if this is a response carrying one
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        match self {
            Self::Response(res) => res.body.as_ref(),
            Self::Redirect(_) => None,
        }
    }
}

impl From<Response> for Reply {
    fn from(res: Response) -> Self {
        Self::Response(res)
    }
}

impl From<Redirect> for Reply {
    fn from(redirect: Redirect) -> Self {
        Self::Redirect(redirect)
    }
}

/// Build a redirect reply
///
/// `RedirectStatus::default()` is `303 See Other`.
#[must_use]
pub fn redirect(url: impl Into<String>, status: RedirectStatus) -> Reply {
    Reply::Redirect(Redirect {
        status,
        url: url.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redirect_default_is_see_other() {
        let reply = redirect("/new-location", RedirectStatus::default());
        assert_eq!(reply.status(), 303);
        assert!(reply.body().is_none());
    }

    #[test]
    fn test_redirect_codes_round_trip() {
        for code in [300, 301, 302, 303, 304, 307, 308] {
            let status = RedirectStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(RedirectStatus::from_code(200), None);
    }

    #[test]
    fn test_response_builders() {
        let reply: Reply = Response::ok(json!({ "users": [] })).into();
        assert_eq!(reply.status(), 200);
        assert_eq!(reply.body(), Some(&json!({ "users": [] })));

        let reply: Reply = Response::new(204).into();
        assert_eq!(reply.status(), 204);
        assert!(reply.body().is_none());
    }

    #[test]
    fn test_reply_serializes_flat() {
        let reply = redirect("/somewhere", RedirectStatus::PermanentRedirect);
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({ "status": 308, "url": "/somewhere" })
        );
    }
}
