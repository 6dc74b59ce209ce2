use std::time::Instant;

use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::operation::{OperationError, RemoteOperation, Sample};

/// A registered account. Created once while bootstrapping and only read
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub access_token: String,
}

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub avatar_id: u32,
    pub verification_code: String,
    pub referral_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    #[serde(default)]
    pub access_request_count: i64,
    pub access_token: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub avatar: Option<Value>,
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub following_count: i64,
    #[serde(default)]
    pub info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub data: RegisterData,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fields: Option<Value>,
}

impl From<RegisterResponse> for Account {
    fn from(res: RegisterResponse) -> Self {
        Self {
            username: res.data.username,
            email: res.data.email,
            access_token: res.data.access_token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub data: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fields: Option<Value>,
}

/// Balance of one account for the polled token.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub value: f64,
    pub status: String,
    pub message: String,
}

impl From<BalanceResponse> for Balance {
    fn from(res: BalanceResponse) -> Self {
        Self {
            value: res.data,
            status: res.status,
            message: res.message,
        }
    }
}

/// Shared HTTP client for the account service. Clones share one connection
/// pool, so build it once and hand clones to the operations.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Sends `request` and decodes a JSON body.
    ///
    /// The reported duration runs until the response headers arrive; decoding
    /// the body is not part of the measured round trip.
    async fn round_trip<T: DeserializeOwned>(request: RequestBuilder) -> Sample<T> {
        let start = Instant::now();
        let res = request.send().await;
        let duration = start.elapsed();

        let res = match res {
            Ok(r) => r,
            Err(e) => return Sample::failed(OperationError::Transport(e.to_string()), duration),
        };
        if !res.status().is_success() {
            return Sample::failed(OperationError::Status(res.status().as_u16()), duration);
        }
        match res.json::<T>().await {
            Ok(body) => Sample::ok(body, duration),
            Err(e) => Sample::failed(OperationError::Decode(e.to_string()), duration),
        }
    }
}

/// Creates one account per call.
#[derive(Debug, Clone)]
pub struct RegisterOperation {
    client: ApiClient,
}

impl RegisterOperation {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl RemoteOperation<RegistrationRequest> for RegisterOperation {
    type Output = RegisterResponse;

    async fn call(&self, input: &RegistrationRequest) -> Sample<RegisterResponse> {
        let request = self
            .client
            .http
            .post(self.client.endpoint("/api/auth/register"))
            .json(input);
        ApiClient::round_trip(request).await
    }
}

/// Looks up the balance of one account for a fixed token.
#[derive(Debug, Clone)]
pub struct BalanceOperation {
    client: ApiClient,
    token: String,
}

impl BalanceOperation {
    pub fn new(client: ApiClient, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
        }
    }
}

impl RemoteOperation<Account> for BalanceOperation {
    type Output = Balance;

    async fn call(&self, account: &Account) -> Sample<Balance> {
        let request = self
            .client
            .http
            .get(self.client.endpoint("/api/user/balance"))
            .query(&[("token", self.token.as_str())])
            .bearer_auth(&account.access_token);
        let sample: Sample<BalanceResponse> = ApiClient::round_trip(request).await;
        Sample {
            value: sample.value.map(Balance::from),
            duration: sample.duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(Url::parse(&server.base_url()).unwrap())
    }

    fn account() -> Account {
        Account {
            username: "alice".into(),
            email: "alice@example.com".into(),
            access_token: "tok-1".into(),
        }
    }

    #[tokio::test]
    async fn register_posts_camel_case_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/auth/register")
                    .json_body(json!({
                        "email": "unix1@gmail.com",
                        "username": "unix1",
                        "password": "Un1x_Generated",
                        "avatarId": 1,
                        "verificationCode": "12345",
                        "referralCode": ""
                    }));
                then.status(200).json_body(json!({
                    "data": {
                        "accessRequestCount": 0,
                        "accessToken": "tok-1",
                        "username": "unix1",
                        "email": "unix1@gmail.com",
                        "admin": false,
                        "avatar": {"id": 1},
                        "followerCount": 0,
                        "followingCount": 0,
                        "info": {}
                    },
                    "status": "success",
                    "message": "registered",
                    "fields": null
                }));
            })
            .await;

        let op = RegisterOperation::new(client_for(&server));
        let input = RegistrationRequest {
            email: "unix1@gmail.com".into(),
            username: "unix1".into(),
            password: "Un1x_Generated".into(),
            avatar_id: 1,
            verification_code: "12345".into(),
            referral_code: String::new(),
        };
        let sample = op.call(&input).await;

        mock.assert_async().await;
        let res = sample.value.unwrap();
        assert_eq!(res.status, "success");
        let account = Account::from(res);
        assert_eq!(account.username, "unix1");
        assert_eq!(account.access_token, "tok-1");
    }

    #[tokio::test]
    async fn balance_sends_bearer_and_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/user/balance")
                    .query_param("token", "gas")
                    .header("authorization", "Bearer tok-1");
                then.status(200)
                    .json_body(json!({"data": 12.5, "status": "success", "message": ""}));
            })
            .await;

        let op = BalanceOperation::new(client_for(&server), "gas");
        let sample = op.call(&account()).await;

        mock.assert_async().await;
        assert_eq!(sample.value.unwrap().value, 12.5);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/user/balance");
                then.status(401).json_body(json!({"status": "error"}));
            })
            .await;

        let op = BalanceOperation::new(client_for(&server), "gas");
        let sample = op.call(&account()).await;

        assert_eq!(sample.value, Err(OperationError::Status(401)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/api/user/balance");
                then.status(200).body("not json");
            })
            .await;

        let op = BalanceOperation::new(client_for(&server), "gas");
        let sample = op.call(&account()).await;

        assert!(matches!(sample.value, Err(OperationError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let client = ApiClient::new(Url::parse("http://127.0.0.1:1").unwrap());
        let sample = BalanceOperation::new(client, "gas").call(&account()).await;

        assert!(matches!(sample.value, Err(OperationError::Transport(_))));
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let client = ApiClient::new(Url::parse("http://localhost:8080/").unwrap());
        assert_eq!(
            client.endpoint("/api/user/balance"),
            "http://localhost:8080/api/user/balance"
        );

        let nested = ApiClient::new(Url::parse("http://localhost:8080/v1").unwrap());
        assert_eq!(
            nested.endpoint("/api/auth/register"),
            "http://localhost:8080/v1/api/auth/register"
        );
    }
}
