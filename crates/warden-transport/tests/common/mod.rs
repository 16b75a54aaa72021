//! Loopback servers and certificates shared by the transport tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, PKCS_ECDSA_P256_SHA256,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// What a scripted HTTP connection does with the next request.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with a 200 and this body, keeping the connection open.
    Reply(&'static str),
    /// Read the request and close without answering.
    Drop,
    /// Send the head and part of a longer body, then go quiet.
    Stall,
}

/// HTTP/1.1 server on loopback; connection `i` follows script `i`.
pub struct HttpServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl HttpServer {
    pub async fn start(scripts: Vec<Vec<Step>>) -> Self {
        Self::start_inner(scripts, None).await
    }

    pub async fn start_tls(scripts: Vec<Vec<Step>>, acceptor: TlsAcceptor) -> Self {
        Self::start_inner(scripts, Some(acceptor)).await
    }

    async fn start_inner(scripts: Vec<Vec<Step>>, acceptor: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));

        let accepted = Arc::clone(&connections);
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut scripts = scripts.into_iter();
            while let Ok((tcp, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                let steps = scripts.next().unwrap_or_default();
                let seen = Arc::clone(&seen);
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            if let Ok(tls) = acceptor.accept(tcp).await {
                                serve(tls, steps, seen).await;
                            }
                        }
                        None => serve(tcp, steps, seen).await,
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            requests,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

async fn serve<S>(stream: S, steps: Vec<Step>, seen: Arc<AtomicUsize>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    for step in steps {
        if read_request(&mut stream).await.is_none() {
            return;
        }
        seen.fetch_add(1, Ordering::SeqCst);
        match step {
            Step::Reply(body) => {
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\r\n{body}",
                    body.len()
                );
                if stream.write_all(response.as_bytes()).await.is_err() {
                    return;
                }
                let _ = stream.flush().await;
            }
            Step::Drop => return,
            Step::Stall => {
                let head = "HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial";
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
                return;
            }
        }
    }
    // out of script: hold the connection until the peer leaves
    let mut sink = Vec::new();
    let _ = stream.read_to_end(&mut sink).await;
}

/// Read one request head and its `Content-Length` body. Returns the
/// request line, or `None` at end of stream.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<String> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.ok()? == 0 {
        return None;
    }
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        if line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await.ok()?;
    Some(request_line.trim_end().to_string())
}

/// A CA and a leaf certificate for `localhost` signed by it.
pub struct TestPki {
    pub ca_pem: String,
    pub chain: Vec<CertificateDer<'static>>,
    leaf_key_der: Vec<u8>,
}

impl TestPki {
    pub fn generate() -> Self {
        let ca_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "warden test CA");
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let mut leaf_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        leaf_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

        Self {
            ca_pem: ca.pem(),
            chain: vec![leaf.der().clone(), ca.der().clone()],
            leaf_key_der: leaf_key.serialize_der(),
        }
    }

    pub fn ca_store(&self) -> rustls::RootCertStore {
        warden_transport::tls_config::parse_root_store(self.ca_pem.as_bytes()).unwrap()
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.leaf_key_der.clone()));
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(self.chain.clone(), key)
            .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }
}

/// Anonymous FTP server on loopback serving files from memory.
pub struct FtpServer {
    pub addr: SocketAddr,
}

impl FtpServer {
    /// `epsv` false makes the server refuse EPSV so clients fall back to PASV.
    pub async fn start(files: HashMap<String, Vec<u8>>, epsv: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let files = Arc::new(files);
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let files = Arc::clone(&files);
                tokio::spawn(async move {
                    let _ = ftp_session(tcp, &files, epsv).await;
                });
            }
        });
        Self { addr }
    }

    pub fn url(&self, path: &str) -> String {
        format!("ftp://{}{path}", self.addr)
    }
}

async fn ftp_session(
    tcp: TcpStream,
    files: &HashMap<String, Vec<u8>>,
    epsv: bool,
) -> std::io::Result<()> {
    let mut control = BufReader::new(tcp);
    control.write_all(b"220-warden test server\r\n220 ready\r\n").await?;
    let mut data_listener: Option<TcpListener> = None;

    loop {
        let mut line = String::new();
        if control.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        let (verb, arg) = line.split_once(' ').unwrap_or((line, ""));
        let reply = match verb {
            "USER" => "331 password required".to_string(),
            "PASS" => "230 logged in".to_string(),
            "TYPE" => "200 type set".to_string(),
            "EPSV" if epsv => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                data_listener = Some(listener);
                format!("229 Entering Extended Passive Mode (|||{port}|)")
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                data_listener = Some(listener);
                format!("227 Entering Passive Mode (127,0,0,1,{},{})", port >> 8, port & 0xff)
            }
            "RETR" => match (files.get(arg), data_listener.take()) {
                (Some(content), Some(listener)) => {
                    control.write_all(b"150 opening data connection\r\n").await?;
                    let (mut data, _) = listener.accept().await?;
                    data.write_all(content).await?;
                    data.shutdown().await?;
                    drop(data);
                    "226 transfer complete".to_string()
                }
                (None, _) => "550 No such file or directory".to_string(),
                (_, None) => "425 use PASV first".to_string(),
            },
            "QUIT" => {
                control.write_all(b"221 bye\r\n").await?;
                return Ok(());
            }
            _ => "502 command not implemented".to_string(),
        };
        control.write_all(format!("{reply}\r\n").as_bytes()).await?;
    }
}
