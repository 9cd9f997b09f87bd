/// Supplies the password for an encrypted PDF.
///
/// Consulted only when the document reports itself encrypted and the empty
/// user password does not open it. Returning `None` means no password is
/// available, and loading fails with [`crate::XfaError::PasswordRequired`].
///
/// Closures implement the trait, so an interactive prompt can be injected by
/// the caller:
///
/// ```no_run
/// use xfaconvert::{ConverterConfig, XfaDocument};
///
/// let ask = || {
///     eprint!("Enter password to decrypt the PDF: ");
///     let mut line = String::new();
///     std::io::stdin().read_line(&mut line).ok()?;
///     Some(line.trim_end().to_string())
/// };
/// let form = XfaDocument::open("form.pdf", ConverterConfig::default(), &ask).unwrap();
/// ```
pub trait CredentialProvider {
    fn password(&self) -> Option<String>;
}

/// Never has a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassword;

impl CredentialProvider for NoPassword {
    fn password(&self) -> Option<String> {
        None
    }
}

/// A password known up front, e.g. from a command-line flag.
#[derive(Debug, Clone)]
pub struct StaticPassword(pub String);

impl CredentialProvider for StaticPassword {
    fn password(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl<F> CredentialProvider for F
where
    F: Fn() -> Option<String>,
{
    fn password(&self) -> Option<String> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_yield_their_password() {
        assert_eq!(NoPassword.password(), None);
        assert_eq!(StaticPassword("s3cret".into()).password().as_deref(), Some("s3cret"));

        let from_closure = || Some("typed".to_string());
        assert_eq!(from_closure.password().as_deref(), Some("typed"));
    }
}
