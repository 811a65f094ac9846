//! Text-entry forms for the login/register and add-device views.
//!
//! A form is a list of single-line fields with one focused field. Key handling
//! only edits text and moves focus; turning the values into API inputs happens
//! in the `*_input` helpers, which do the local checks that must pass before
//! anything is sent.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::types::{CreateDeviceInput, LoginInput, MetadataEntry, RegisterInput};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    pub label: &'static str,
    pub value: String,
    pub masked: bool,
}

impl TextField {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            value: String::new(),
            masked: false,
        }
    }

    fn masked(label: &'static str) -> Self {
        Self {
            masked: true,
            ..Self::new(label)
        }
    }

    /// What the view shows for this field.
    pub fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    None,
    Submit,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub fields: Vec<TextField>,
    pub focus: usize,
    pub error: Option<String>,
    pub submitting: bool,
}

pub const EMAIL: &str = "Email";
pub const PASSWORD: &str = "Password";
pub const NAME: &str = "Name";
pub const DEVICE_TYPE: &str = "Type";
pub const METADATA: &str = "Metadata (key=value, ...)";

impl Form {
    fn with(fields: Vec<TextField>) -> Self {
        Self {
            fields,
            focus: 0,
            error: None,
            submitting: false,
        }
    }

    pub fn login() -> Self {
        Self::with(vec![TextField::new(EMAIL), TextField::masked(PASSWORD)])
    }

    pub fn register() -> Self {
        Self::with(vec![
            TextField::new(NAME),
            TextField::new(EMAIL),
            TextField::masked(PASSWORD),
        ])
    }

    pub fn add_device() -> Self {
        Self::with(vec![
            TextField::new(NAME),
            TextField::new(DEVICE_TYPE),
            TextField::new(METADATA),
        ])
    }

    pub fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|f| f.label == label)
            .map(|f| f.value.as_str())
            .unwrap_or("")
    }

    pub fn set(&mut self, label: &str, value: &str) {
        if let Some(f) = self.fields.iter_mut().find(|f| f.label == label) {
            f.value = value.to_string();
        }
    }

    pub fn focus_next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Edit the focused field. Keys are ignored while a submit is in flight.
    pub fn handle_key(&mut self, key: KeyEvent) -> FormAction {
        if self.submitting {
            return match key.code {
                KeyCode::Esc => FormAction::Cancel,
                _ => FormAction::None,
            };
        }
        match key.code {
            KeyCode::Esc => return FormAction::Cancel,
            KeyCode::Enter => return FormAction::Submit,
            KeyCode::Tab | KeyCode::Down => self.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.focus_prev(),
            KeyCode::Backspace => {
                if let Some(f) = self.fields.get_mut(self.focus) {
                    f.value.pop();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(f) = self.fields.get_mut(self.focus) {
                    f.value.push(c);
                }
            }
            _ => {}
        }
        FormAction::None
    }
}

fn required(form: &Form, label: &str) -> Result<String, String> {
    let v = form.value(label).trim();
    if v.is_empty() {
        return Err(format!("{} is required", label.to_lowercase()));
    }
    Ok(v.to_string())
}

pub fn login_input(form: &Form) -> Result<LoginInput, String> {
    let email = required(form, EMAIL)?;
    required(form, PASSWORD)?;
    // passwords are sent as typed
    Ok(LoginInput {
        email,
        password: form.value(PASSWORD).to_string(),
    })
}

pub fn register_input(form: &Form) -> Result<RegisterInput, String> {
    let name = required(form, NAME)?;
    let email = required(form, EMAIL)?;
    required(form, PASSWORD)?;
    Ok(RegisterInput {
        email,
        password: form.value(PASSWORD).to_string(),
        name,
        role: None,
    })
}

pub fn create_device_input(form: &Form) -> Result<CreateDeviceInput, String> {
    Ok(CreateDeviceInput {
        name: required(form, NAME)?,
        kind: required(form, DEVICE_TYPE)?,
        metadata: parse_pairs(form.value(METADATA))?,
    })
}

/// `key=value` pairs separated by commas. Blank segments are skipped.
pub fn parse_pairs(raw: &str) -> Result<Vec<MetadataEntry>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .map(|seg| match seg.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok(MetadataEntry::new(k.trim(), v.trim())),
            _ => Err(format!("metadata entry '{seg}' must look like key=value")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(form: &mut Form, s: &str) {
        for c in s.chars() {
            form.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_tab_and_backspace() {
        let mut f = Form::login();
        type_str(&mut f, "ops@example.comm");
        f.handle_key(key(KeyCode::Backspace));
        assert_eq!(f.handle_key(key(KeyCode::Tab)), FormAction::None);
        type_str(&mut f, "pw");
        assert_eq!(f.value(EMAIL), "ops@example.com");
        assert_eq!(f.fields[1].display(), "**");
        f.handle_key(key(KeyCode::BackTab));
        assert_eq!(f.focus, 0);
        assert_eq!(f.handle_key(key(KeyCode::Enter)), FormAction::Submit);
        assert_eq!(f.handle_key(key(KeyCode::Esc)), FormAction::Cancel);
    }

    #[test]
    fn submitting_form_ignores_edits() {
        let mut f = Form::login();
        f.submitting = true;
        type_str(&mut f, "x");
        assert_eq!(f.value(EMAIL), "");
        assert_eq!(f.handle_key(key(KeyCode::Enter)), FormAction::None);
    }

    #[test]
    fn login_requires_both_fields() {
        let mut f = Form::login();
        f.set(EMAIL, "  ");
        assert_eq!(login_input(&f).unwrap_err(), "email is required");
        f.set(EMAIL, "a@b.c");
        assert_eq!(login_input(&f).unwrap_err(), "password is required");
        f.set(PASSWORD, " secret ");
        let li = login_input(&f).unwrap();
        assert_eq!(li.password, " secret ");
    }

    #[test]
    fn add_device_parses_metadata_pairs() {
        let mut f = Form::add_device();
        f.set(NAME, "Boiler");
        f.set(DEVICE_TYPE, "thermostat");
        f.set(METADATA, "location = Basement, ,firmware=1.2");
        let ci = create_device_input(&f).unwrap();
        assert_eq!(
            ci.metadata,
            vec![
                MetadataEntry::new("location", "Basement"),
                MetadataEntry::new("firmware", "1.2")
            ]
        );
        f.set(METADATA, "broken");
        assert!(create_device_input(&f).unwrap_err().contains("key=value"));
        f.set(DEVICE_TYPE, "");
        assert_eq!(create_device_input(&f).unwrap_err(), "type is required");
    }

    #[test]
    fn register_collects_name_email_password() {
        let mut f = Form::register();
        f.set(NAME, "Ops");
        f.set(EMAIL, "ops@example.com");
        f.set(PASSWORD, "pw");
        let ri = register_input(&f).unwrap();
        assert_eq!((ri.name.as_str(), ri.role), ("Ops", None));
    }
}
