use std::borrow::Cow;

/// Compile options for ERB templates.
///
/// Use [`ErbOptions::default()`] to get the default configuration and
/// [`ErbOptions::builder()`] to create a custom one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErbOptions {
    pub(crate) buffer: Cow<'static, str>,
    pub(crate) encoding: Option<Cow<'static, str>>,
    pub(crate) trim: bool,
}

/// A builder for the ERB compile options.
///
/// This struct is typically created using [`ErbOptions::builder()`].
#[derive(Debug, Clone)]
pub struct ErbOptionsBuilder {
    buffer: Cow<'static, str>,
    encoding: Option<Cow<'static, str>>,
    trim: bool,
}

/// Compile options for Haml templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HamlOptions {
    pub(crate) buffer: Cow<'static, str>,
}

/// A builder for the Haml compile options.
#[derive(Debug, Clone)]
pub struct HamlOptionsBuilder {
    buffer: Cow<'static, str>,
}

impl Default for ErbOptions {
    /// Returns the default ERB configuration.
    ///
    /// This is equivalent to the following.
    /// ```
    /// use viewbridge::ErbOptions;
    ///
    /// let options = ErbOptions::builder()
    ///     .buffer("_erbout")
    ///     .encoding("UTF-8")
    ///     .trim(true)
    ///     .build();
    /// assert_eq!(options, ErbOptions::default());
    /// ```
    #[inline]
    fn default() -> Self {
        ErbOptions::builder().build()
    }
}

impl ErbOptions {
    /// Create a new options builder.
    #[inline]
    pub fn builder() -> ErbOptionsBuilder {
        ErbOptionsBuilder::new()
    }

    /// The name of the output accumulator.
    #[inline]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

impl ErbOptionsBuilder {
    /// Creates a new builder with the default settings.
    #[inline]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            buffer: Cow::Borrowed("_erbout"),
            encoding: Some(Cow::Borrowed("UTF-8")),
            trim: true,
        }
    }

    /// Set the name of the output accumulator.
    ///
    /// Templates can write through the accumulator directly, for example
    /// `<% _erbout.concat("text") %>`.
    ///
    /// # Panics
    ///
    /// If the name is empty.
    #[inline]
    pub fn buffer(&mut self, name: impl Into<Cow<'static, str>>) -> &mut Self {
        let name = name.into();
        assert!(!name.is_empty());
        self.buffer = name;
        self
    }

    /// Set the encoding declared to the accumulator before the first write.
    #[inline]
    pub fn encoding(&mut self, encoding: impl Into<Cow<'static, str>>) -> &mut Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Do not declare an encoding to the accumulator.
    #[inline]
    pub fn no_encoding(&mut self) -> &mut Self {
        self.encoding = None;
        self
    }

    /// Whether `<%-` and `-%>` trim surrounding whitespace.
    #[inline]
    pub fn trim(&mut self, trim: bool) -> &mut Self {
        self.trim = trim;
        self
    }

    /// Builds the options.
    pub fn build(&self) -> ErbOptions {
        ErbOptions {
            buffer: self.buffer.clone(),
            encoding: self.encoding.clone(),
            trim: self.trim,
        }
    }
}

impl Default for HamlOptions {
    #[inline]
    fn default() -> Self {
        HamlOptions::builder().build()
    }
}

impl HamlOptions {
    /// Create a new options builder.
    #[inline]
    pub fn builder() -> HamlOptionsBuilder {
        HamlOptionsBuilder::new()
    }

    /// The name of the receiver of appends.
    #[inline]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

impl HamlOptionsBuilder {
    /// Creates a new builder with the default settings.
    #[inline]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            buffer: Cow::Borrowed("haml_buffer"),
        }
    }

    /// Set the name of the receiver of appends, e.g. `- haml_buffer << "x"`.
    ///
    /// # Panics
    ///
    /// If the name is empty.
    #[inline]
    pub fn buffer(&mut self, name: impl Into<Cow<'static, str>>) -> &mut Self {
        let name = name.into();
        assert!(!name.is_empty());
        self.buffer = name;
        self
    }

    /// Builds the options.
    pub fn build(&self) -> HamlOptions {
        HamlOptions {
            buffer: self.buffer.clone(),
        }
    }
}
