use actix_cors::Cors;
use actix_web::{
    App,
    HttpServer,
    dev::ServerHandle,
    web,
};
use anyhow::{
    Context,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    net::TcpListener,
    thread::JoinHandle,
};
use url::Url;

/// JSON body of `GET /api/paymaster`.
///
/// The haiku client asks this same-origin endpoint where the sponsorship
/// service lives, so the real service URL (and any key embedded in it)
/// never ships to clients as configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymasterDto {
    pub url: String,
}

pub struct PaymasterProxy {
    base_url: String,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl PaymasterProxy {
    pub fn new(port: Option<u16>, service_url: Url) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0)))
            .context("failed to bind HTTP listener for paymaster proxy")?;
        let address = listener
            .local_addr()
            .context("failed to read listener address")?;
        let base_url = format!("http://{}", address);

        tracing::info!("paymaster proxy listening on {}", base_url);

        let server = HttpServer::new(move || {
            App::new()
                .wrap(Cors::permissive())
                .app_data(web::Data::new(service_url.clone()))
                .route("/api/paymaster", web::get().to(handle_paymaster))
        })
        .listen(listener)
        .context("failed to start Actix server")?
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Ok(Self {
            base_url,
            server_handle,
            server_thread: Some(server_thread),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for PaymasterProxy {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(true);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle_paymaster(service_url: web::Data<Url>) -> web::Json<PaymasterDto> {
    tracing::info!("received paymaster lookup");
    web::Json(PaymasterDto {
        url: service_url.get_ref().to_string(),
    })
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_paymaster__returns_the_configured_service_url() {
        // given
        let service_url: Url = "https://sponsor.example/rpc/key-123".parse().unwrap();
        let proxy = PaymasterProxy::new(None, service_url).unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/api/paymaster", proxy.base_url());

        // when
        let response = client.get(url).send().await.unwrap();

        // then
        assert!(response.status().is_success());
        let dto = response.json::<PaymasterDto>().await.unwrap();
        assert_eq!(dto.url, "https://sponsor.example/rpc/key-123");
    }

    #[tokio::test]
    async fn get_paymaster__unknown_paths_are_not_found() {
        let service_url: Url = "https://sponsor.example/rpc".parse().unwrap();
        let proxy = PaymasterProxy::new(None, service_url).unwrap();
        let client = reqwest::Client::new();
        let url = format!("{}/api/other", proxy.base_url());

        let response = client.get(url).send().await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
