//! libconfig serializer.
//!
//! Output is stable: settings keep their order, nested blocks are indented
//! by four spaces and every setting ends with `;`.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use crate::value::{Document, Group, Value};

const INDENT: usize = 4;

/// Serialize a document to libconfig text.
pub fn to_string(document: &Document) -> String {
    let mut out = String::new();
    write_settings(&mut out, &document.root, 0);
    out
}

/// Serialize a document and write it to `path`.
pub fn write_file(document: &Document, path: &Path) -> io::Result<()> {
    fs::write(path, to_string(document))
}

fn write_settings(out: &mut String, group: &Group, indent: usize) {
    for setting in group {
        pad(out, indent);
        out.push_str(&setting.name);
        match &setting.value {
            Value::Group(_) | Value::List(_) | Value::Array(_) => {
                out.push_str(" =\n");
                write_value(out, &setting.value, indent);
            }
            scalar => {
                out.push_str(" = ");
                write_value(out, scalar, 0);
            }
        }
        out.push_str(";\n");
    }
}

/// Write a value whose first line starts at `indent`.
fn write_value(out: &mut String, value: &Value, indent: usize) {
    pad(out, indent);
    match value {
        Value::Group(group) => {
            out.push_str("{\n");
            write_settings(out, group, indent + INDENT);
            pad(out, indent);
            out.push('}');
        }
        Value::List(items) => write_items(out, items, '(', ')', indent),
        Value::Array(items) => write_items(out, items, '[', ']', indent),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Int(i) => write_int(out, *i),
        Value::Int64(i) => {
            let _ = write!(out, "{}L", i);
        }
        Value::Float(f) => write_float(out, *f),
        Value::Str(s) => write_string(out, s),
    }
}

fn write_items(out: &mut String, items: &[Value], open: char, close: char, indent: usize) {
    out.push(open);
    out.push('\n');
    for (index, item) in items.iter().enumerate() {
        write_value(out, item, indent + INDENT);
        if index + 1 < items.len() {
            out.push(',');
        }
        out.push('\n');
    }
    pad(out, indent);
    out.push(close);
}

/// Hex literals up to 0xFFFFFFFF in magnitude parse as plain ints; values
/// outside the 32-bit range stay hex so they do not read back as 64-bit.
fn write_int(out: &mut String, i: i64) {
    if i32::try_from(i).is_ok() {
        let _ = write!(out, "{}", i);
    } else if i < 0 {
        let _ = write!(out, "-0x{:X}", i.unsigned_abs());
    } else {
        let _ = write!(out, "0x{:X}", i);
    }
}

fn write_float(out: &mut String, f: f64) {
    // Debug formatting always keeps a '.' or an exponent, so the value
    // reads back as a float rather than an integer.
    let _ = write!(out, "{:?}", f);
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_write_nested_document() {
        let doc = parse(
            r#"software = { version = "1.0"; images = ( { filename = "a.img"; size = 10; } ); };"#,
        )
        .unwrap();

        let expected = "\
software =
{
    version = \"1.0\";
    images =
    (
        {
            filename = \"a.img\";
            size = 10;
        }
    );
};
";
        assert_eq!(to_string(&doc), expected);
    }

    #[test]
    fn test_output_reparses_to_same_tree() {
        let text = r#"
            a = "quote\" backslash\\ tab\t";
            b = 5000000000L;
            c = 2.0;
            d = 1e-3;
            e = [ 1, 2, 3 ];
            f = ( "x", { g = false; }, ( ) );
            h = { };
            i = 0xFFFFFFFF;
            j = -0xFFFFFFFF;
            k = -0x8000000000000000;
        "#;
        let doc = parse(text).unwrap();
        let reparsed = parse(&to_string(&doc)).unwrap();
        assert_eq!(doc, reparsed);
    }

    #[test]
    fn test_out_of_range_ints_written_as_hex() {
        let doc = parse("a = -0xFFFFFFFF; b = 0x80000000; c = -12;").unwrap();
        assert_eq!(to_string(&doc), "a = -0xFFFFFFFF;\nb = 0x80000000;\nc = -12;\n");
    }

    #[test]
    fn test_floats_keep_float_syntax() {
        let mut out = String::new();
        write_float(&mut out, 3.0);
        assert_eq!(out, "3.0");
    }

    #[test]
    fn test_control_characters_escaped() {
        let mut out = String::new();
        write_string(&mut out, "a\u{1}b");
        assert_eq!(out, "\"a\\x01b\"");
    }
}
