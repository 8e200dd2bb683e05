use serde::Deserialize;

pub mod handlers;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateUserRequest {
    /// Shallow shape check only; delivery problems surface when mail is sent.
    pub fn validate(&self) -> Result<(), String> {
        let email = self.email.trim();
        let Some((local, domain)) = email.split_once('@') else {
            return Err("email must contain '@'".to_string());
        };
        if local.is_empty() || !domain.contains('.') {
            return Err(format!("'{email}' is not a valid email address"));
        }
        Ok(())
    }
}
