//! [`UserConfig`] backend: every value is one option, keyed by the `/`-joined scope.

use indexmap::IndexMap;

use crate::array::Array;
use crate::error::Result;
use crate::io::{Handler, Reader, Scope, Writer};
use crate::userconfig::UserConfig;
use crate::value::Value;

/// Writes values as options of one section of a [`UserConfig`].
///
/// ```
/// use guidata::io::{GroupExt, IniWriter, Writer};
/// use guidata::UserConfig;
///
/// let mut conf = UserConfig::default();
/// let mut writer = IniWriter::new(&mut conf, "plot", "curve");
/// writer.group("width", |w| w.write_float(1.5))?;
/// assert_eq!(conf.get_raw("plot", "curve/width"), Some("1.5"));
/// # Ok::<(), guidata::Error>(())
/// ```
pub struct IniWriter<'a> {
    conf: &'a mut UserConfig,
    section: String,
    scope: Scope,
}

impl<'a> IniWriter<'a> {
    /// Keys start with `option`.
    pub fn new(conf: &'a mut UserConfig, section: &str, option: &str) -> Self {
        IniWriter { conf, section: section.to_string(), scope: Scope::with_root(option) }
    }

    fn write_any(&mut self, value: impl Into<Value>) -> Result<()> {
        let option = self.option();
        self.conf.set(&self.section, &option, value)
    }
}

impl Handler for IniWriter<'_> {
    fn scope(&self) -> &Scope { &self.scope }
    fn scope_mut(&mut self) -> &mut Scope { &mut self.scope }
}

impl Writer for IniWriter<'_> {
    fn write_bool(&mut self, value: bool) -> Result<()> { self.write_any(value) }
    fn write_int(&mut self, value: i64) -> Result<()> { self.write_any(value) }
    fn write_float(&mut self, value: f64) -> Result<()> { self.write_any(value) }
    fn write_str(&mut self, value: &str) -> Result<()> { self.write_any(value) }
    fn write_array(&mut self, value: &Array) -> Result<()> { self.write_any(value.clone()) }
    fn write_sequence(&mut self, value: &[Value]) -> Result<()> { self.write_any(value.to_vec()) }
    fn write_dict(&mut self, value: &IndexMap<String, Value>) -> Result<()> { self.write_any(value.clone()) }
    fn write_none(&mut self) -> Result<()> { self.write_any(Value::None) }
}

/// Reads values from the options of one section of a [`UserConfig`].
pub struct IniReader<'a> {
    conf: &'a UserConfig,
    section: String,
    scope: Scope,
}

impl<'a> IniReader<'a> {
    pub fn new(conf: &'a UserConfig, section: &str, option: &str) -> Self {
        IniReader { conf, section: section.to_string(), scope: Scope::with_root(option) }
    }
}

impl Handler for IniReader<'_> {
    fn scope(&self) -> &Scope { &self.scope }
    fn scope_mut(&mut self) -> &mut Scope { &mut self.scope }
}

impl Reader for IniReader<'_> {
    fn read_any(&mut self) -> Result<Value> {
        self.conf.get(&self.section, &self.option())
    }

    /// Nested objects leave no option of their own, only options below it.
    fn is_group(&mut self) -> bool {
        self.conf.has_option_prefix(&self.section, &self.option())
    }

    /// Text that happens to look like another literal is still read as text.
    fn read_str(&mut self) -> Result<Option<String>> {
        match self.read_any()? {
            Value::None => Ok(None),
            Value::Str(s) => Ok(Some(s)),
            other => Ok(Some(self.conf.get_raw(&self.section, &self.option())
                .map_or_else(|| other.to_string(), str::to_string))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{GroupExt, ReaderExt};

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn keys_follow_the_scope() -> TestResult {
        let mut conf = UserConfig::default();
        let mut writer = IniWriter::new(&mut conf, "main", "params");
        writer.group("a", |w| w.group("b", |w| w.write_int(3)))?;
        writer.write_named(&Value::from("x"), "c")?;
        assert_eq!(writer.option(), "params");

        assert_eq!(conf.get_raw("main", "params/a/b"), Some("3"));
        let mut reader = IniReader::new(&conf, "main", "params");
        assert_eq!(reader.group("a", |r| r.group("b", |r| r.read_int()))?, Some(3));
        assert_eq!(reader.read("c", |r| r.read_str(), None)?, Some("x".to_string()));
        assert!(reader.group("a", |r| r.is_group()));
        assert!(!reader.group("c", |r| r.is_group()));
        Ok(())
    }

    #[test]
    fn digits_read_as_text() -> TestResult {
        let conf: UserConfig = "[s]\nopt/name = 0042\n".parse()?;
        let mut reader = IniReader::new(&conf, "s", "opt");
        assert_eq!(reader.read("name", |r| r.read_str(), None)?, Some("0042".to_string()));
        Ok(())
    }

    #[test]
    fn missing_option_is_missing_key() {
        let conf = UserConfig::default();
        let mut reader = IniReader::new(&conf, "s", "opt");
        let err = reader.read("nothing", |r| r.read_float(), None).unwrap_err();
        assert!(err.is_missing_key());
    }
}
