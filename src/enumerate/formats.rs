//! Username format templates

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, UserForgeError};

/// Small catalog: the most common corporate conventions
const SMALL_FORMATS: &[&str] = &[
    "<name>",
    "<name><surname>",
    "<firstletter_name><surname>",
    "<name><firstletter_surname>",
    "<firstletter_name><name><firstletter_surname>",
];

/// Big catalog: separators, initials and doubled surnames
const BIG_FORMATS: &[&str] = &[
    "<name>",
    "<name><surname>",
    "<name>.<surname>",
    "<name>_<surname>",
    "<name>-<surname>",
    "<firstletter_name><surname>",
    "<firstletter_name>.<surname>",
    "<firstletter_name>_<surname>",
    "<firstletter_name>-<surname>",
    "<name><firstletter_surname>",
    "<name>.<firstletter_surname>",
    "<name>_<firstletter_surname>",
    "<name>-<firstletter_surname>",
    "<name><surname><surname>",
    "<name>.<surname>.<surname>",
    "<name>_<surname>_<surname>",
    "<name>-<surname>_<surname>",
    "<firstletter_name><surname><surname>",
    "<firstletter_name>.<surname>.<surname>",
    "<firstletter_name>_<surname>_<surname>",
    "<firstletter_name>-<surname>_<surname>",
    "<firstletter_name><name><firstletter_surname>",
];

/// A single piece of a format template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<name>`
    Name,
    /// `<surname>`
    Surname,
    /// `<firstletter_name>`
    NameInitial,
    /// `<firstletter_surname>`
    SurnameInitial,
    /// Text copied as-is (separators)
    Literal(String),
}

impl Token {
    fn from_placeholder(placeholder: &str) -> Option<Self> {
        match placeholder {
            "name" => Some(Token::Name),
            "surname" => Some(Token::Surname),
            "firstletter_name" => Some(Token::NameInitial),
            "firstletter_surname" => Some(Token::SurnameInitial),
            _ => None,
        }
    }
}

/// Immutable naming-convention pattern, e.g. `<firstletter_name>.<surname>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatTemplate {
    pattern: String,
    tokens: Vec<Token>,
}

impl FormatTemplate {
    /// Parse a template from its placeholder syntax
    pub fn parse(pattern: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut rest = pattern;

        while !rest.is_empty() {
            match rest.find('<') {
                Some(0) => {
                    let end = rest.find('>').ok_or_else(|| {
                        UserForgeError::validation(format!("Unterminated placeholder in format '{}'", pattern))
                    })?;
                    let placeholder = &rest[1..end];
                    let token = Token::from_placeholder(placeholder).ok_or_else(|| {
                        UserForgeError::validation(format!(
                            "Unknown placeholder <{}> in format '{}'",
                            placeholder, pattern
                        ))
                    })?;
                    tokens.push(token);
                    rest = &rest[end + 1..];
                }
                Some(start) => {
                    tokens.push(Token::Literal(rest[..start].to_string()));
                    rest = &rest[start..];
                }
                None => {
                    tokens.push(Token::Literal(rest.to_string()));
                    rest = "";
                }
            }
        }

        if !tokens.iter().any(|t| !matches!(t, Token::Literal(_))) {
            return Err(UserForgeError::validation(format!(
                "Format '{}' contains no placeholder",
                pattern
            )));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            tokens,
        })
    }

    /// Substitute every placeholder with the given name and surname
    pub fn render(&self, name: &str, surname: &str) -> String {
        let mut out = String::with_capacity(self.pattern.len() + name.len() + surname.len());
        for token in &self.tokens {
            match token {
                Token::Name => out.push_str(name),
                Token::Surname => out.push_str(surname),
                Token::NameInitial => out.extend(name.chars().next()),
                Token::SurnameInitial => out.extend(surname.chars().next()),
                Token::Literal(text) => out.push_str(text),
            }
        }
        out
    }

    /// Original placeholder syntax
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Display for FormatTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Which built-in catalog to enumerate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatLevel {
    #[default]
    Small,
    Big,
}

impl FormatLevel {
    fn patterns(&self) -> &'static [&'static str] {
        match self {
            FormatLevel::Small => SMALL_FORMATS,
            FormatLevel::Big => BIG_FORMATS,
        }
    }

    /// Parsed templates of this catalog, in enumeration order
    pub fn templates(&self) -> Vec<FormatTemplate> {
        self.patterns()
            .iter()
            .map(|p| FormatTemplate::parse(p).expect("Built-in format catalog is well-formed"))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns().len()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatLevel::Small => "small",
            FormatLevel::Big => "big",
        }
    }
}

impl fmt::Display for FormatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatLevel {
    type Err = UserForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "small" => Ok(FormatLevel::Small),
            "big" => Ok(FormatLevel::Big),
            other => Err(UserForgeError::validation(format!(
                "Unknown format level '{}' (expected small or big)",
                other
            ))),
        }
    }
}
