use darling::FromAttributes;
use syn::DeriveInput;

/// Parsed attributes from #[provider(...)]
#[derive(Debug, Default, FromAttributes)]
#[darling(attributes(provider), default)]
pub struct ProviderArgs {
    /// Provider type name; defaults to the lowercased struct name
    pub name: Option<String>,
}

pub fn parse_provider_args(input: &DeriveInput) -> darling::Result<ProviderArgs> {
    ProviderArgs::from_attributes(&input.attrs)
}

/// Type names end up inside symbol names, so only identifier characters
/// are accepted.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("provider name must not be empty".to_string());
    }
    match name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        Some(c) => Err(format!("invalid character {:?} in provider name {:?}", c, name)),
        None => Ok(()),
    }
}
