//! Interactive connect form: server IP first, then port.

use shared::DEFAULT_PORT;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
const MAX_FIELD_LEN: usize = 45;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFormError {
    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),
    #[error("'{0}' is not a valid port (1-65535)")]
    InvalidPort(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStage {
    Address,
    Port,
}

#[derive(Debug, Clone)]
pub struct ConnectForm {
    stage: ConnectStage,
    address: String,
    port: String,
    parsed_ip: Option<IpAddr>,
    error: Option<ConnectFormError>,
}

impl ConnectForm {
    pub fn new() -> Self {
        Self {
            stage: ConnectStage::Address,
            address: String::new(),
            port: String::new(),
            parsed_ip: None,
            error: None,
        }
    }

    pub fn stage(&self) -> ConnectStage {
        self.stage
    }

    pub fn error(&self) -> Option<&ConnectFormError> {
        self.error.as_ref()
    }

    pub fn prompt(&self) -> String {
        match self.stage {
            ConnectStage::Address => format!("Server IP (default {}):", DEFAULT_ADDRESS),
            ConnectStage::Port => format!("Port (default {}):", DEFAULT_PORT),
        }
    }

    /// Text typed so far in the active field
    pub fn input(&self) -> &str {
        match self.stage {
            ConnectStage::Address => &self.address,
            ConnectStage::Port => &self.port,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        match self.stage {
            ConnectStage::Address => &mut self.address,
            ConnectStage::Port => &mut self.port,
        }
    }

    /// Appends a typed character. Control and non-ASCII characters are ignored.
    pub fn push_char(&mut self, c: char) {
        if !c.is_ascii_graphic() {
            return;
        }
        let field = self.field_mut();
        if field.len() < MAX_FIELD_LEN {
            field.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.field_mut().pop();
    }

    /// Confirms the active field.
    ///
    /// Returns `Ok(None)` after a valid IP (the form moves on to the port) and
    /// the full address once the port is accepted. An invalid entry keeps the
    /// form on the same field and is also kept for display.
    pub fn submit(&mut self) -> Result<Option<SocketAddr>, ConnectFormError> {
        let result = self.validate();
        self.error = result.as_ref().err().cloned();
        result
    }

    fn validate(&mut self) -> Result<Option<SocketAddr>, ConnectFormError> {
        match self.stage {
            ConnectStage::Address => {
                let text = self.address.trim();
                let text = if text.is_empty() { DEFAULT_ADDRESS } else { text };
                let ip = text
                    .parse::<IpAddr>()
                    .map_err(|_| ConnectFormError::InvalidAddress(text.to_string()))?;
                self.parsed_ip = Some(ip);
                self.stage = ConnectStage::Port;
                Ok(None)
            }
            ConnectStage::Port => {
                let text = self.port.trim();
                let port = if text.is_empty() {
                    DEFAULT_PORT
                } else {
                    match text.parse::<u16>() {
                        Ok(port) if port != 0 => port,
                        _ => return Err(ConnectFormError::InvalidPort(text.to_string())),
                    }
                };
                let Some(ip) = self.parsed_ip else {
                    self.stage = ConnectStage::Address;
                    return Ok(None);
                };
                Ok(Some(SocketAddr::new(ip, port)))
            }
        }
    }
}

impl Default for ConnectForm {
    fn default() -> Self {
        Self::new()
    }
}
