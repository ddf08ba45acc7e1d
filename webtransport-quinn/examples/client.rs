use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use url::Url;

/// Connect to a WebTransport server and exchange a single echo message.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    server: IpAddr,

    #[arg(long, default_value_t = 4443)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut tls_config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
        .with_no_client_auth();
    tls_config.alpn_protocols = vec![webtransport_quinn::ALPN.to_vec()];

    let client_config = quinn::ClientConfig::new(Arc::new(tls_config));
    let mut endpoint = quinn::Endpoint::client(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))?;
    endpoint.set_default_client_config(client_config);

    let url = Url::parse(&format!("https://{}:{}/webtransport", args.server, args.port))?;
    log::info!("connecting to {url}");

    let session = webtransport_quinn::connect(&endpoint, &url).await?;
    log::info!("session established");

    let (mut send, mut recv) = session.open_bi().await?;
    send.write_all(b"hello world").await?;
    send.finish().await?;

    let response = recv.read_to_end(64 * 1024).await?;
    log::info!("received: {}", String::from_utf8_lossy(&response));

    Ok(())
}

/// Development-only: accept any server certificate. Never use in production.
struct SkipServerVerification;

impl rustls::client::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
