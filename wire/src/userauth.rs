use crate::msg;
use crate::primitive::{Reader, Writer};
use common_types::Error;

pub const SERVICE_NAME: &str = "ssh-userauth";
pub const CONNECTION_SERVICE_NAME: &str = "ssh-connection";

/// The method-specific tail of a `USERAUTH_REQUEST`.
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Always fails; used by clients to probe which methods are acceptable.
    None,
    Password {
        password: String,
    },
    PublicKey {
        algorithm: String,
        blob: Vec<u8>,
        /// `None` for an unsigned probe, `Some` for the signed request
        /// carrying a signature over `session_id ‖ request-fields`.
        signature: Option<Vec<u8>>,
    },
    KeyboardInteractive {
        language: String,
        submethods: String,
    },
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Password { .. } => "password",
            AuthMethod::PublicKey { .. } => "publickey",
            AuthMethod::KeyboardInteractive { .. } => "keyboard-interactive",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserauthRequest {
    pub user: String,
    pub service: String,
    pub method: AuthMethod,
}

impl UserauthRequest {
    /// Encode everything up to (but not including) the trailing signature
    /// of a `publickey` request — this is the byte range the client signs
    /// and the server re-derives to verify.
    pub fn encode_signed_prefix(&self) -> Vec<u8> {
        let (algorithm, blob) = match &self.method {
            AuthMethod::PublicKey { algorithm, blob, .. } => (algorithm.clone(), blob.clone()),
            _ => panic!("encode_signed_prefix is only meaningful for publickey requests"),
        };
        let mut w = Writer::new();
        w.byte(msg::USERAUTH_REQUEST);
        w.string(self.user.as_bytes());
        w.string(self.service.as_bytes());
        w.string(b"publickey");
        w.boolean(true);
        w.string(algorithm.as_bytes());
        w.string(&blob);
        w.into_bytes()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::USERAUTH_REQUEST);
        w.string(self.user.as_bytes());
        w.string(self.service.as_bytes());
        w.string(self.method.name().as_bytes());
        match &self.method {
            AuthMethod::None => {}
            AuthMethod::Password { password } => {
                w.boolean(false); // want_change
                w.string(password.as_bytes());
            }
            AuthMethod::PublicKey { algorithm, blob, signature } => {
                w.boolean(signature.is_some());
                w.string(algorithm.as_bytes());
                w.string(blob);
                if let Some(sig) = signature {
                    w.string(sig);
                }
            }
            AuthMethod::KeyboardInteractive { language, submethods } => {
                w.string(language.as_bytes());
                w.string(submethods.as_bytes());
            }
        }
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::USERAUTH_REQUEST {
            return Err(Error::BadData("expected USERAUTH_REQUEST".into()));
        }
        let user = r.utf8_string()?;
        let service = r.utf8_string()?;
        let method_name = r.utf8_string()?;
        let method = match method_name.as_str() {
            "none" => AuthMethod::None,
            "password" => {
                let _want_change = r.boolean()?;
                AuthMethod::Password { password: r.utf8_string()? }
            }
            "publickey" => {
                let has_signature = r.boolean()?;
                let algorithm = r.utf8_string()?;
                let blob = r.string()?.to_vec();
                let signature = if has_signature { Some(r.string()?.to_vec()) } else { None };
                AuthMethod::PublicKey { algorithm, blob, signature }
            }
            "keyboard-interactive" => AuthMethod::KeyboardInteractive {
                language: r.utf8_string()?,
                submethods: r.utf8_string()?,
            },
            other => return Err(Error::NotAvailable(format!("unsupported auth method {}", other))),
        };
        Ok(UserauthRequest { user, service, method })
    }
}

#[derive(Debug, Clone)]
pub struct UserauthFailure {
    pub methods_continue: Vec<String>,
    pub partial_success: bool,
}

impl UserauthFailure {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::USERAUTH_FAILURE);
        w.name_list(&self.methods_continue);
        w.boolean(self.partial_success);
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::USERAUTH_FAILURE {
            return Err(Error::BadData("expected USERAUTH_FAILURE".into()));
        }
        Ok(UserauthFailure {
            methods_continue: r.name_list()?,
            partial_success: r.boolean()?,
        })
    }
}

pub fn encode_userauth_success() -> Vec<u8> {
    vec![msg::USERAUTH_SUCCESS]
}

#[derive(Debug, Clone)]
pub struct InfoRequest {
    pub name: String,
    pub instruction: String,
    pub language: String,
    /// (prompt text, echo).
    pub prompts: Vec<(String, bool)>,
}

impl InfoRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::USERAUTH_INFO_REQUEST);
        w.string(self.name.as_bytes());
        w.string(self.instruction.as_bytes());
        w.string(self.language.as_bytes());
        w.uint32(self.prompts.len() as u32);
        for (prompt, echo) in &self.prompts {
            w.string(prompt.as_bytes());
            w.boolean(*echo);
        }
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::USERAUTH_INFO_REQUEST {
            return Err(Error::BadData("expected USERAUTH_INFO_REQUEST".into()));
        }
        let name = r.utf8_string()?;
        let instruction = r.utf8_string()?;
        let language = r.utf8_string()?;
        let count = r.uint32()? as usize;
        let mut prompts = Vec::with_capacity(count);
        for _ in 0..count {
            let prompt = r.utf8_string()?;
            let echo = r.boolean()?;
            prompts.push((prompt, echo));
        }
        Ok(InfoRequest { name, instruction, language, prompts })
    }

    /// The client must see at least one prompt beginning with "Password"
    /// (case-insensitive, at the start) or it rejects the request as an
    /// unsupported flavor of keyboard-interactive.
    pub fn has_password_prompt(&self) -> bool {
        self.prompts
            .iter()
            .any(|(p, _)| p.to_ascii_lowercase().starts_with("password"))
    }
}

#[derive(Debug, Clone)]
pub struct InfoResponse {
    pub responses: Vec<String>,
}

impl InfoResponse {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.byte(msg::USERAUTH_INFO_RESPONSE);
        w.uint32(self.responses.len() as u32);
        for resp in &self.responses {
            w.string(resp.as_bytes());
        }
        w.into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(payload);
        let msg_type = r.byte()?;
        if msg_type != msg::USERAUTH_INFO_RESPONSE {
            return Err(Error::BadData("expected USERAUTH_INFO_RESPONSE".into()));
        }
        let count = r.uint32()? as usize;
        let mut responses = Vec::with_capacity(count);
        for _ in 0..count {
            responses.push(r.utf8_string()?);
        }
        Ok(InfoResponse { responses })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn password_request_round_trips() {
        let req = UserauthRequest {
            user: "alice".into(),
            service: CONNECTION_SERVICE_NAME.into(),
            method: AuthMethod::Password { password: "secret".into() },
        };
        let encoded = req.encode();
        let decoded = UserauthRequest::decode(&encoded).unwrap();
        assert_eq!(decoded.user, "alice");
        match decoded.method {
            AuthMethod::Password { password } => assert_eq!(password, "secret"),
            _ => panic!("wrong method"),
        }
    }

    #[test]
    fn info_request_detects_password_prompt() {
        let req = InfoRequest {
            name: "".into(),
            instruction: "".into(),
            language: "".into(),
            prompts: vec![("Password: ".into(), false)],
        };
        assert!(req.has_password_prompt());
    }

    #[test]
    fn info_request_without_password_prompt_is_rejected_by_caller_logic() {
        let req = InfoRequest {
            name: "".into(),
            instruction: "".into(),
            language: "".into(),
            prompts: vec![("Favorite color: ".into(), true)],
        };
        assert!(!req.has_password_prompt());
    }
}
