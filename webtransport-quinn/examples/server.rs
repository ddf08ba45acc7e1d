use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use clap::Parser;

/// Accept a single WebTransport session and echo back whatever it receives.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = 4443)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()])?;
    let cert_der = cert.serialize_der()?;
    let key_der = cert.serialize_private_key_der();

    let mut tls_config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(
            vec![rustls::Certificate(cert_der)],
            rustls::PrivateKey(key_der),
        )?;
    tls_config.alpn_protocols = vec![webtransport_quinn::ALPN.to_vec()];

    let server_config = quinn::ServerConfig::with_crypto(Arc::new(tls_config));
    let endpoint = quinn::Endpoint::server(
        server_config,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port),
    )?;

    log::info!("listening on {}", endpoint.local_addr()?);

    while let Some(incoming) = endpoint.accept().await {
        tokio::spawn(async move {
            if let Err(e) = handle(incoming).await {
                log::error!("session failed: {e:#}");
            }
        });
    }

    Ok(())
}

async fn handle(incoming: quinn::Connecting) -> anyhow::Result<()> {
    let conn = incoming.await?;
    let request = webtransport_quinn::accept(conn).await?;
    log::info!("connect request for {}", request.url());

    let session = request.ok().await?;
    log::info!("session established");

    loop {
        let (mut send, mut recv) = session.accept_bi().await?;
        let data = recv.read_to_end(64 * 1024).await?;
        log::info!("echoing {} bytes", data.len());
        send.write_all(&data).await?;
        send.finish().await?;
    }
}
