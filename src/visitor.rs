use std::io::{self, BufRead, Write};

use crate::dataset::DataSet;
use crate::error::{Error, Result};
use crate::item::DataItem;

/// Per-kind callbacks run by [`DataSet::accept`].
///
/// Every method falls back to [`visit_item`](Self::visit_item), which does nothing.
#[allow(unused_variables)]
pub trait ItemVisitor {
    fn visit_item(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { Ok(()) }

    fn visit_float(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_int(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_string(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_text(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_bool(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    /// Date and date-time items.
    fn visit_date(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_color(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    /// File and directory items.
    fn visit_path(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    /// Single, multiple and image choice items.
    fn visit_choice(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_float_array(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_dict(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_button(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_font_family(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    fn visit_object(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
    /// Begin/end group markers.
    fn visit_group_marker(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.visit_item(instance, item) }
}

/// Line-oriented editor for float, int and string items.
///
/// Each item is prompted as `label ? ` until the typed text gives a valid value.
///
/// ```
/// use guidata::{DataSet, IntItem, Schema, Value};
///
/// let schema = Schema::builder("S").item("n", IntItem::new("Count").min(0)).build();
/// let mut ds = DataSet::new(schema);
/// let mut out = Vec::new();
/// ds.text_edit_with(&b"-1\n2*3\n"[..], &mut out)?;
/// assert_eq!(ds.get("n"), Some(&Value::Int(6)));
/// assert_eq!(String::from_utf8_lossy(&out), "Count ? Incorrect value!\nCount ? ");
/// # Ok::<(), guidata::Error>(())
/// ```
pub struct TextEditVisitor<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TextEditVisitor<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TextEditVisitor { input, output }
    }

    fn prompt(&mut self, item: &DataItem) -> Result<String> {
        write!(self.output, "{} ? ", item.label())?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed while editing").into());
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn edit(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> {
        loop {
            let text = self.prompt(item)?;
            match item.set_from_string(instance, &text) {
                Ok(()) | Err(Error::Validation { .. }) => {},
                Err(e) => return Err(e),
            }
            if item.check_item(instance) {
                return Ok(());
            }
            writeln!(self.output, "Incorrect value!")?;
        }
    }
}

impl<R: BufRead, W: Write> ItemVisitor for TextEditVisitor<R, W> {
    fn visit_float(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.edit(instance, item) }
    fn visit_int(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.edit(instance, item) }
    fn visit_string(&mut self, instance: &mut DataSet, item: &DataItem) -> Result<()> { self.edit(instance, item) }
}
