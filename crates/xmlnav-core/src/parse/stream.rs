use super::{Element, line_col_at};
use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::BufReader;

/// Read buffer size used by the incremental path.
const CHUNK_SIZE: usize = 64 * 1024;

pub(super) fn parse(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    let mut asm = Assembler::default();
    loop {
        let event = reader
            .read_event()
            .map_err(|err| at(text, reader.buffer_position(), err.to_string()))?;
        if !feed(&mut asm, event).map_err(|msg| at(text, reader.buffer_position(), msg))? {
            break;
        }
    }
    asm.finish().map_err(|msg| at(text, text.len(), msg))
}

/// Same as [`parse`], but pulls the input through a bounded buffer so that only one event's
/// bytes are held at a time besides the tree under construction.
pub(super) fn parse_incremental(text: &str) -> Result<Element> {
    let mut reader = Reader::from_reader(BufReader::with_capacity(CHUNK_SIZE, text.as_bytes()));
    let mut asm = Assembler::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| at(text, reader.buffer_position(), err.to_string()))?;
        if !feed(&mut asm, event).map_err(|msg| at(text, reader.buffer_position(), msg))? {
            break;
        }
    }
    asm.finish().map_err(|msg| at(text, text.len(), msg))
}

fn at(text: &str, offset: usize, message: String) -> Error {
    let (line, column) = line_col_at(text, offset);
    Error::parse(message, line, column)
}

/// Applies one event; returns `Ok(false)` at end of input.
fn feed(asm: &mut Assembler, event: Event<'_>) -> std::result::Result<bool, String> {
    match event {
        Event::Start(start) => asm.open(element_from_start(&start)?)?,
        Event::Empty(start) => {
            asm.open(element_from_start(&start)?)?;
            asm.close(None)?;
        }
        Event::End(end) => {
            let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
            asm.close(Some(&name))?;
        }
        Event::Text(text) => {
            let value = text.unescape().map_err(|err| err.to_string())?;
            asm.text(&value)?;
        }
        Event::CData(data) => {
            let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
            asm.text(&value)?;
        }
        Event::Eof => return Ok(false),
        _ => {}
    }
    Ok(true)
}

fn element_from_start(start: &BytesStart<'_>) -> std::result::Result<Element, String> {
    let mut el = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        if key == "xmlns" {
            el.namespaces.insert(String::new(), value.into_owned());
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            el.namespaces.insert(prefix.to_string(), value.into_owned());
        } else {
            el.attributes.insert(key, value.into_owned());
        }
    }
    Ok(el)
}

/// Builds an [`Element`] tree from a flat start/text/end event sequence.
#[derive(Default)]
struct Assembler {
    stack: Vec<Element>,
    root: Option<Element>,
}

impl Assembler {
    fn open(&mut self, el: Element) -> std::result::Result<(), String> {
        if self.stack.is_empty() && self.root.is_some() {
            return Err(format!(
                "junk after document element: unexpected <{}>",
                el.tag
            ));
        }
        self.stack.push(el);
        Ok(())
    }

    fn close(&mut self, name: Option<&str>) -> std::result::Result<(), String> {
        let Some(el) = self.stack.pop() else {
            return Err(format!(
                "unexpected closing tag </{}>",
                name.unwrap_or_default()
            ));
        };
        if let Some(name) = name {
            if name != el.tag {
                return Err(format!(
                    "mismatched tag: expected </{}>, found </{name}>",
                    el.tag
                ));
            }
        }
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(el),
            None => self.root = Some(el),
        }
        Ok(())
    }

    fn text(&mut self, chunk: &str) -> std::result::Result<(), String> {
        let Some(top) = self.stack.last_mut() else {
            if chunk.trim().is_empty() {
                return Ok(());
            }
            return Err("text outside of the document element".to_string());
        };
        let slot = match top.children.last_mut() {
            Some(prev) => &mut prev.tail,
            None => &mut top.text,
        };
        slot.get_or_insert_with(String::new).push_str(chunk);
        Ok(())
    }

    fn finish(self) -> std::result::Result<Element, String> {
        if let Some(open) = self.stack.last() {
            return Err(format!("unclosed element <{}>", open.tag));
        }
        self.root.ok_or_else(|| "no element found".to_string())
    }
}
