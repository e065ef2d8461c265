#[cfg(feature = "multi-thread")]
use geo_headers::config::ConfigThreads;
use geo_headers::config::{parse_config, Config};
use geo_headers::service::{log_response, make_error_response, GeoHeadersService, InvalidConfigError};

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use std::convert::Infallible;
use std::sync::Arc;

async fn async_main(config: Config) -> anyhow::Result<()> {
    let host = config.host;

    simple_logger::init_with_level(config.effective_log_level())?;

    let geo_headers_service = tokio::task::spawn_blocking(move || -> Result<_, InvalidConfigError> {
        Ok(Arc::new(GeoHeadersService::from_config(config)?))
    })
    .await??;
    log::info!(
        "proxying {} to {}",
        host,
        geo_headers_service.proxy().upstream()
    );

    let make_service = make_service_fn(move |connection: &AddrStream| {
        let remote_addr = connection.remote_addr();
        let proxy = geo_headers_service.proxy().clone();
        let service = service_fn(move |request: Request<Body>| {
            let proxy = proxy.clone();
            async move {
                let method = request.method().clone();
                let uri = request.uri().clone();
                let response = proxy
                    .forward(request)
                    .await
                    .unwrap_or_else(make_error_response);
                log_response(remote_addr, &method, &uri, &response);
                Ok::<_, Infallible>(response)
            }
        });
        let service = geo_headers_service.middleware(service, remote_addr);
        async move { Ok::<_, Infallible>(service) }
    });

    let server = Server::bind(&host).serve(make_service);

    if let Err(e) = server.await {
        log::error!("server error: {}", e);
    }
    Err(anyhow::anyhow!("server exited"))
}

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "geo-headers.toml".to_owned());

    let config = parse_config(&config_path)?;

    #[cfg(feature = "multi-thread")]
    let mut runtime_builder = match config.threads {
        ConfigThreads::Custom(threads) => match threads.into() {
            1 => tokio::runtime::Builder::new_current_thread(),
            threads => {
                let mut builder = tokio::runtime::Builder::new_multi_thread();
                builder.worker_threads(threads);
                builder
            }
        },
        ConfigThreads::Cores => tokio::runtime::Builder::new_multi_thread(),
    };
    #[cfg(not(feature = "multi-thread"))]
    let mut runtime_builder = tokio::runtime::Builder::new_current_thread();
    let runtime = runtime_builder.enable_all().build()?;

    runtime.block_on(async_main(config))
}
