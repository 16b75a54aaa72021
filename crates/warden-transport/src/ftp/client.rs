//! Minimal passive-mode FTP client: login, binary mode, RETR.

use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::dial::TcpConnector;
use crate::error::FetchError;

use super::has_line_break;

/// A server reply: code and (possibly multi-line) text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    fn expect(self, codes: &[u16]) -> Result<Reply, FetchError> {
        if codes.contains(&self.code) {
            Ok(self)
        } else {
            Err(FetchError::Ftp {
                code: self.code,
                message: self.message,
            })
        }
    }
}

/// Control connection.
pub(crate) struct FtpControl {
    stream: BufReader<TcpStream>,
    peer: IpAddr,
}

impl FtpControl {
    /// Connect and read the greeting.
    pub async fn connect(tcp: &TcpConnector, addr: &str) -> Result<Self, FetchError> {
        let stream = tcp.dial(addr).await?;
        let peer = stream.peer_addr()?.ip();
        let mut control = Self {
            stream: BufReader::new(stream),
            peer,
        };
        control.read_reply().await?.expect(&[220])?;
        Ok(control)
    }

    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), FetchError> {
        let reply = self.command("USER", Some(user)).await?;
        match reply.code {
            230 | 202 => Ok(()),
            331 | 332 => {
                self.command("PASS", Some(password))
                    .await?
                    .expect(&[230, 202])?;
                Ok(())
            }
            _ => Err(FetchError::Ftp {
                code: reply.code,
                message: reply.message,
            }),
        }
    }

    pub async fn binary(&mut self) -> Result<(), FetchError> {
        self.command("TYPE", Some("I")).await?.expect(&[200])?;
        Ok(())
    }

    /// Open a passive data connection, trying EPSV before PASV.
    ///
    /// The data connection always goes to the control connection's peer;
    /// only the port is taken from the reply.
    pub async fn open_data(&mut self, tcp: &TcpConnector) -> Result<TcpStream, FetchError> {
        let reply = self.command("EPSV", None).await?;
        let port = if reply.code == 229 {
            parse_epsv(&reply.message)?
        } else {
            let reply = self.command("PASV", None).await?.expect(&[227])?;
            parse_pasv(&reply.message)?
        };
        tcp.dial(&SocketAddr::new(self.peer, port).to_string()).await
    }

    /// Start a download; the file arrives on the data connection.
    pub async fn retrieve(&mut self, path: &str) -> Result<(), FetchError> {
        self.command("RETR", Some(path)).await?.expect(&[125, 150])?;
        Ok(())
    }

    /// Read the reply closing a transfer.
    pub async fn finish_transfer(&mut self) -> Result<(), FetchError> {
        self.read_reply().await?.expect(&[226, 250])?;
        Ok(())
    }

    pub async fn quit(mut self) {
        let _ = self.command("QUIT", None).await;
    }

    async fn command(&mut self, verb: &str, arg: Option<&str>) -> Result<Reply, FetchError> {
        if has_line_break(verb) || arg.is_some_and(has_line_break) {
            return Err(FetchError::FtpProtocol(format!(
                "refusing multi-line {verb} command"
            )));
        }
        debug!(verb, "ftp command");
        let line = match arg {
            Some(arg) => format!("{verb} {arg}\r\n"),
            None => format!("{verb}\r\n"),
        };
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply, FetchError> {
        let first = self.read_line().await?;
        let code = parse_code(&first)?;
        let mut message = first.get(4..).unwrap_or_default().to_string();

        if first.as_bytes().get(3) == Some(&b'-') {
            let last_prefix = format!("{code} ");
            loop {
                let line = self.read_line().await?;
                message.push('\n');
                if let Some(rest) = line.strip_prefix(&last_prefix) {
                    message.push_str(rest);
                    break;
                }
                if line == code.to_string() {
                    break;
                }
                message.push_str(&line);
            }
        }
        Ok(Reply { code, message })
    }

    async fn read_line(&mut self) -> Result<String, FetchError> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(FetchError::FtpProtocol(
                "control connection closed".to_string(),
            ));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn parse_code(line: &str) -> Result<u16, FetchError> {
    let code = line
        .get(..3)
        .filter(|c| c.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| FetchError::FtpProtocol(format!("malformed reply: {line:?}")))?;
    match line.as_bytes().get(3) {
        None | Some(b' ') | Some(b'-') => Ok(code),
        _ => Err(FetchError::FtpProtocol(format!("malformed reply: {line:?}"))),
    }
}

/// Port from `229 Entering Extended Passive Mode (|||port|)`.
fn parse_epsv(message: &str) -> Result<u16, FetchError> {
    let malformed = || FetchError::FtpProtocol(format!("malformed EPSV reply: {message:?}"));
    let start = message.find('(').ok_or_else(malformed)?;
    let end = message.rfind(')').ok_or_else(malformed)?;
    let inner = message.get(start + 1..end).ok_or_else(malformed)?;
    let delim = inner.chars().next().ok_or_else(malformed)?;
    inner
        .split(delim)
        .nth(3)
        .and_then(|port| port.parse().ok())
        .ok_or_else(malformed)
}

/// Port from `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`.
fn parse_pasv(message: &str) -> Result<u16, FetchError> {
    let malformed = || FetchError::FtpProtocol(format!("malformed PASV reply: {message:?}"));
    let start = message
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(malformed)?;
    let fields: Vec<u8> = message[start..]
        .split(|c: char| !c.is_ascii_digit())
        .filter(|f| !f.is_empty())
        .take(6)
        .map(|f| f.parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| malformed())?;
    match fields[..] {
        [_, _, _, _, hi, lo] => Ok((u16::from(hi) << 8) | u16::from(lo)),
        _ => Err(malformed()),
    }
}
