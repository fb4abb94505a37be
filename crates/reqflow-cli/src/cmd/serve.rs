use anyhow::Context;
use reqflow_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("failed to bind port {port}"))?;
        let actual_port = listener.local_addr()?.port();
        println!("reqflow API for '{}' on http://localhost:{actual_port}", config.project.name);

        tokio::select! {
            res = reqflow_server::serve_on(root, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
