//! XML exporter.
//!
//! Layout:
//!
//! ```xml
//! <data>
//!   <columns><column>room_id</column>...</columns>
//!   <rows><row><room_id>1</room_id>...</row>...</rows>
//! </data>
//! ```
//!
//! Cell elements are named after their column. Column names are written as
//! given; a name that is not a valid XML tag yields a malformed document.

use crate::core::{Result, TabularResult};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn to_writer<W: Write>(result: &TabularResult, inner: W) -> Result<W> {
    let mut writer = Writer::new(inner);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("data").write_inner_content(|w| {
        w.create_element("columns").write_inner_content(|w| {
            for column in result.columns() {
                w.create_element("column")
                    .write_text_content(BytesText::new(column))?;
            }
            Ok::<(), quick_xml::Error>(())
        })?;

        w.create_element("rows").write_inner_content(|w| {
            for record in result.records() {
                w.create_element("row").write_inner_content(|w| {
                    for (column, value) in &record {
                        let text = value.to_string();
                        w.create_element(*column)
                            .write_text_content(BytesText::new(&text))?;
                    }
                    Ok::<(), quick_xml::Error>(())
                })?;
            }
            Ok::<(), quick_xml::Error>(())
        })?;
        Ok::<(), quick_xml::Error>(())
    })?;

    Ok(writer.into_inner())
}

pub fn to_string(result: &TabularResult) -> Result<String> {
    let bytes = to_writer(result, Vec::new())?;
    // The writer only emits UTF-8
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn write(result: &TabularResult, path: &Path) -> Result<()> {
    let file = BufWriter::new(File::create(path)?);
    let mut file = to_writer(result, file)?;
    file.flush()?;
    Ok(())
}
