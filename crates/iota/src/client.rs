//! HTTP client for the IoT Agent northbound provisioning API.
//!
//! | Operation      | Config group                                   | Device                       |
//! |----------------|------------------------------------------------|------------------------------|
//! | read / exists  | `GET /iot/services?resource=..&apikey=..`      | `GET /iot/devices/{id}`      |
//! | create         | `POST /iot/services` `{"services": [..]}`      | `POST /iot/devices` `{"devices": [..]}` |
//! | update         | `PUT /iot/services?resource=..&apikey=..`      | `PUT /iot/devices/{id}`      |
//! | delete         | `DELETE /iot/services?resource=..&apikey=..`   | `DELETE /iot/devices/{id}`   |
//!
//! Every scoped request carries the `fiware-service` and
//! `fiware-servicepath` headers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, field, warn};

use crate::{
    error::IotaError,
    models::{ConfigGroup, Device, GroupKey, Scope},
    store::{RemoteStore, Resource},
};

const SERVICE_HEADER: &str = "fiware-service";
const SERVICE_PATH_HEADER: &str = "fiware-servicepath";

#[derive(Debug, Deserialize)]
struct GroupList {
    #[serde(default)]
    services: Vec<ConfigGroup>,
}

#[derive(Debug, Clone)]
pub struct IotaClient {
    base: Url,
    http: Client,
    timeout: Duration,
}

impl IotaClient {
    /// Creates a client for the agent listening on `host:port` over plain HTTP.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, IotaError> {
        Self::from_url(&format!("http://{host}:{port}"), timeout)
    }

    /// Creates a client from a base URL such as `http://iot-agent:4041`.
    ///
    /// # Errors
    ///
    /// Returns [`IotaError::InvalidEndpoint`] if `url` does not parse or
    /// cannot carry a path.
    pub fn from_url(url: &str, timeout: Duration) -> Result<Self, IotaError> {
        let base =
            Url::parse(url).map_err(|e| IotaError::InvalidEndpoint(format!("{url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(IotaError::InvalidEndpoint(format!("{url}: not a base URL")));
        }

        Ok(Self {
            base,
            http: Client::new(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Fetches the agent's `/iot/about` document.
    pub async fn about(&self) -> Result<Value, IotaError> {
        let url = self.endpoint(&["iot", "about"]);
        let response = self.send(self.http.get(url).timeout(self.timeout)).await?;
        Ok(response.json().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn group_endpoint(&self, key: &GroupKey) -> Url {
        let mut url = self.endpoint(&["iot", "services"]);
        url.query_pairs_mut()
            .append_pair("resource", &key.resource)
            .append_pair("apikey", &key.apikey);
        url
    }

    fn device_endpoint(&self, id: &str) -> Url {
        self.endpoint(&["iot", "devices", id])
    }

    fn request(&self, method: Method, url: Url, scope: &Scope) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(SERVICE_HEADER, &scope.service)
            .header(SERVICE_PATH_HEADER, &scope.service_path)
            .timeout(self.timeout)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, IotaError> {
        let response = request.send().await?;
        self.check(response).await
    }

    async fn check(&self, response: Response) -> Result<Response, IotaError> {
        let status = response.status();

        if !status.is_success() {
            warn!(response = field::display(status), "received error response");
            let message = response.text().await.unwrap_or_default();
            return Err(IotaError::Status(status, message));
        }

        debug!(response = field::display(status), "success");
        Ok(response)
    }

    async fn find_group(&self, scope: &Scope, key: &GroupKey) -> Result<ConfigGroup, IotaError> {
        let url = self.group_endpoint(key);
        let response = self.send(self.request(Method::GET, url, scope)).await?;
        let list: GroupList = response.json().await?;

        list.services
            .into_iter()
            .find(|g| g.resource == key.resource && g.apikey == key.apikey)
            .ok_or_else(|| IotaError::NotFound {
                kind: ConfigGroup::KIND,
                key: key.to_string(),
            })
    }

    async fn find_device(&self, scope: &Scope, id: &str) -> Result<Device, IotaError> {
        let url = self.device_endpoint(id);
        let response = self.request(Method::GET, url, scope).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IotaError::NotFound {
                kind: Device::KIND,
                key: id.to_string(),
            });
        }

        let response = self.check(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteStore<ConfigGroup> for IotaClient {
    async fn exists(&self, scope: &Scope, key: &GroupKey) -> Result<bool, IotaError> {
        match self.find_group(scope, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, scope: &Scope, record: &ConfigGroup) -> Result<(), IotaError> {
        let url = self.endpoint(&["iot", "services"]);
        let body = json!({ "services": [record] });
        self.send(self.request(Method::POST, url, scope).json(&body)).await?;
        Ok(())
    }

    async fn update(
        &self,
        scope: &Scope,
        key: &GroupKey,
        record: &ConfigGroup,
    ) -> Result<(), IotaError> {
        let url = self.group_endpoint(key);
        self.send(self.request(Method::PUT, url, scope).json(record)).await?;
        Ok(())
    }

    async fn read(&self, scope: &Scope, key: &GroupKey) -> Result<ConfigGroup, IotaError> {
        self.find_group(scope, key).await
    }

    async fn delete(&self, scope: &Scope, key: &GroupKey) -> Result<(), IotaError> {
        let url = self.group_endpoint(key);
        self.send(self.request(Method::DELETE, url, scope)).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore<Device> for IotaClient {
    async fn exists(&self, scope: &Scope, key: &String) -> Result<bool, IotaError> {
        match self.find_device(scope, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, scope: &Scope, record: &Device) -> Result<(), IotaError> {
        let url = self.endpoint(&["iot", "devices"]);
        let body = json!({ "devices": [record] });
        self.send(self.request(Method::POST, url, scope).json(&body)).await?;
        Ok(())
    }

    /// The device id travels in the path only; the agent rejects it in the body.
    async fn update(&self, scope: &Scope, key: &String, record: &Device) -> Result<(), IotaError> {
        let url = self.device_endpoint(key);
        let body = Device {
            id: String::new(),
            ..record.clone()
        };
        self.send(self.request(Method::PUT, url, scope).json(&body)).await?;
        Ok(())
    }

    async fn read(&self, scope: &Scope, key: &String) -> Result<Device, IotaError> {
        self.find_device(scope, key).await
    }

    async fn delete(&self, scope: &Scope, key: &String) -> Result<(), IotaError> {
        let url = self.device_endpoint(key);
        self.send(self.request(Method::DELETE, url, scope)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    fn scope() -> Scope {
        Scope::new("smart", "/rooms")
    }

    fn client(server: &Server) -> IotaClient {
        IotaClient::from_url(&server.url(), Duration::from_secs(5)).unwrap()
    }

    fn group_query() -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("resource".into(), "/iot/d".into()),
            Matcher::UrlEncoded("apikey".into(), "key".into()),
        ])
    }

    fn group_key() -> GroupKey {
        GroupKey {
            resource: "/iot/d".into(),
            apikey: "key".into(),
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = IotaClient::from_url("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(IotaError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = IotaClient::new("iot-agent", 4041, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.device_endpoint("a b").as_str(),
            "http://iot-agent:4041/iot/devices/a%20b"
        );
        assert_eq!(
            client.group_endpoint(&group_key()).as_str(),
            "http://iot-agent:4041/iot/services?resource=%2Fiot%2Fd&apikey=key"
        );
    }

    #[tokio::test]
    async fn test_group_exists_when_listed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex("^/iot/services".into()))
            .match_query(group_query())
            .match_header(SERVICE_HEADER, "smart")
            .match_header(SERVICE_PATH_HEADER, "/rooms")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"count":1,"services":[{"resource":"/iot/d","apikey":"key","entity_type":"Thing"}]}"#,
            )
            .create_async()
            .await;

        let exists = RemoteStore::<ConfigGroup>::exists(&client(&server), &scope(), &group_key())
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(exists);
    }

    #[tokio::test]
    async fn test_group_absent_when_list_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/iot/services".into()))
            .match_query(group_query())
            .with_status(200)
            .with_body(r#"{"count":0,"services":[]}"#)
            .create_async()
            .await;

        let exists = RemoteStore::<ConfigGroup>::exists(&client(&server), &scope(), &group_key())
            .await
            .unwrap();
        assert!(!exists);
    }

    #[tokio::test]
    async fn test_create_group_wraps_in_services() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/iot/services")
            .match_header(SERVICE_HEADER, "smart")
            .match_body(Matcher::Json(json!({
                "services": [{ "resource": "/iot/d", "apikey": "key", "entity_type": "Thing" }]
            })))
            .with_status(201)
            .create_async()
            .await;

        let group = ConfigGroup::new("/iot/d", "key", "Thing");
        client(&server).create(&scope(), &group).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_group_uses_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Regex("^/iot/services".into()))
            .match_query(group_query())
            .match_body(Matcher::PartialJson(json!({ "entity_type": "Sensor" })))
            .with_status(204)
            .create_async()
            .await;

        let group = ConfigGroup::new("/iot/d", "key", "Sensor");
        client(&server)
            .update(&scope(), &group_key(), &group)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_device_exists_by_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/iot/devices/present")
            .with_status(200)
            .with_body(r#"{"device_id":"present","entity_name":"Thing:present"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/iot/devices/absent")
            .with_status(404)
            .with_body(r#"{"name":"DEVICE_NOT_FOUND"}"#)
            .create_async()
            .await;

        let client = client(&server);
        let present = RemoteStore::<Device>::exists(&client, &scope(), &"present".to_string())
            .await
            .unwrap();
        let absent = RemoteStore::<Device>::exists(&client, &scope(), &"absent".to_string())
            .await
            .unwrap();
        assert!(present);
        assert!(!absent);
    }

    #[tokio::test]
    async fn test_read_missing_device_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/iot/devices/ghost")
            .with_status(404)
            .create_async()
            .await;

        let result = RemoteStore::<Device>::read(&client(&server), &scope(), &"ghost".to_string()).await;
        assert!(matches!(result, Err(IotaError::NotFound { kind: "device", .. })));
    }

    #[tokio::test]
    async fn test_update_device_keeps_id_out_of_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/iot/devices/dev1")
            .match_header(SERVICE_PATH_HEADER, "/rooms")
            .match_body(Matcher::Json(json!({
                "entity_name": "Thing:dev1",
                "entity_type": "Thing"
            })))
            .with_status(204)
            .create_async()
            .await;

        let device = Device {
            entity_name: Some("Thing:dev1".into()),
            ..Device::new("dev1").with_entity_type("Thing")
        };
        client(&server)
            .update(&scope(), &"dev1".to_string(), &device)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/iot/devices")
            .with_status(409)
            .with_body(r#"{"name":"DUPLICATE_DEVICE_ID"}"#)
            .create_async()
            .await;

        let result = client(&server).create(&scope(), &Device::new("dev1")).await;
        match result {
            Err(IotaError::Status(code, body)) => {
                assert_eq!(code, StatusCode::CONFLICT);
                assert!(body.contains("DUPLICATE_DEVICE_ID"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_device() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/iot/devices/dev1")
            .match_header(SERVICE_HEADER, "smart")
            .with_status(204)
            .create_async()
            .await;

        RemoteStore::<Device>::delete(&client(&server), &scope(), &"dev1".to_string())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_about() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/iot/about")
            .with_status(200)
            .with_body(r#"{"libVersion":"4.0.0","port":"4041"}"#)
            .create_async()
            .await;

        let about = client(&server).about().await.unwrap();
        assert_eq!(about["libVersion"], "4.0.0");
    }
}
