use std::path::Path;

/// The syntax of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// Text with embedded `<% code %>` and `<%= output %>` tags.
    Erb,
    /// Indentation based markup, e.g. `%p= user.name`.
    Haml,
}

impl Syntax {
    /// Returns the syntax for a template file extension, without the dot.
    ///
    /// # Examples
    ///
    /// ```
    /// use viewbridge::Syntax;
    ///
    /// assert_eq!(Syntax::from_extension("erb"), Some(Syntax::Erb));
    /// assert_eq!(Syntax::from_extension("haml"), Some(Syntax::Haml));
    /// assert_eq!(Syntax::from_extension("jelly"), None);
    /// ```
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "erb" => Some(Self::Erb),
            "haml" => Some(Self::Haml),
            _ => None,
        }
    }

    /// Returns the syntax for a template path based on its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Returns the file extension, without the dot.
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Erb => "erb",
            Self::Haml => "haml",
        }
    }

    pub(crate) const fn human(&self) -> &'static str {
        match self {
            Self::Erb => "ERB",
            Self::Haml => "Haml",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_from_path() {
        assert_eq!(Syntax::from_path("views/index.erb"), Some(Syntax::Erb));
        assert_eq!(Syntax::from_path("layout.html.haml"), Some(Syntax::Haml));
        assert_eq!(Syntax::from_path("index.jelly"), None);
        assert_eq!(Syntax::from_path("erb"), None);
    }
}
