use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};

type XmlWriter = Writer<Vec<u8>>;

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::protocol(format!("failed encoding XML-RPC request: {}", e)))
}

fn open(writer: &mut XmlWriter, tag: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new(tag)))
}

fn close(writer: &mut XmlWriter, tag: &str) -> Result<()> {
    emit(writer, Event::End(BytesEnd::new(tag)))
}

fn text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<()> {
    open(writer, tag)?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    close(writer, tag)
}

/// Encode a `methodCall` document with a single struct parameter.
///
/// Top-level params named in `binary` hold base64 text and are sent as
/// `<base64>` instead of `<string>`.
pub fn encode_call(method: &str, params: &Map<String, Value>, binary: &[&str]) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    open(&mut writer, "methodCall")?;
    text_element(&mut writer, "methodName", method)?;
    open(&mut writer, "params")?;
    open(&mut writer, "param")?;
    open(&mut writer, "value")?;
    open(&mut writer, "struct")?;
    for (name, value) in params {
        open(&mut writer, "member")?;
        text_element(&mut writer, "name", name)?;
        match value {
            Value::String(data) if binary.contains(&name.as_str()) => {
                open(&mut writer, "value")?;
                text_element(&mut writer, "base64", data)?;
                close(&mut writer, "value")?;
            }
            other => write_value(&mut writer, other)?,
        }
        close(&mut writer, "member")?;
    }
    close(&mut writer, "struct")?;
    close(&mut writer, "value")?;
    close(&mut writer, "param")?;
    close(&mut writer, "params")?;
    close(&mut writer, "methodCall")?;
    Ok(writer.into_inner())
}

fn write_value(writer: &mut XmlWriter, value: &Value) -> Result<()> {
    open(writer, "value")?;
    match value {
        Value::Null => {
            open(writer, "nil")?;
            close(writer, "nil")?;
        }
        Value::Bool(b) => text_element(writer, "boolean", if *b { "1" } else { "0" })?,
        Value::Number(n) if n.is_f64() => text_element(writer, "double", &n.to_string())?,
        Value::Number(n) => text_element(writer, "int", &n.to_string())?,
        Value::String(s) => text_element(writer, "string", s)?,
        Value::Array(items) => {
            open(writer, "array")?;
            open(writer, "data")?;
            for item in items {
                write_value(writer, item)?;
            }
            close(writer, "data")?;
            close(writer, "array")?;
        }
        Value::Object(members) => {
            open(writer, "struct")?;
            for (name, member) in members {
                open(writer, "member")?;
                text_element(writer, "name", name)?;
                write_value(writer, member)?;
                close(writer, "member")?;
            }
            close(writer, "struct")?;
        }
    }
    close(writer, "value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(params: Value, binary: &[&str]) -> String {
        let params = params.as_object().unwrap().clone();
        String::from_utf8(encode_call("Bug.get", &params, binary).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_scalars_and_lists() {
        let xml = encode(json!({"ids": [1, 2], "permissive": true, "summary": "a < b"}), &[]);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<methodName>Bug.get</methodName>"));
        assert!(xml.contains(
            "<member><name>ids</name><value><array><data><value><int>1</int></value><value><int>2</int></value></data></array></value></member>"
        ));
        assert!(xml.contains("<value><boolean>1</boolean></value>"));
        assert!(xml.contains("<string>a &lt; b</string>"));
    }

    #[test]
    fn test_encode_binary_params_as_base64() {
        let xml = encode(json!({"data": "aGVsbG8=", "summary": "aGVsbG8="}), &["data"]);
        assert!(xml.contains("<name>data</name><value><base64>aGVsbG8=</base64></value>"));
        assert!(xml.contains("<name>summary</name><value><string>aGVsbG8=</string></value>"));
    }

    #[test]
    fn test_encode_nested_struct() {
        let xml = encode(json!({"cc": {"add": ["a@example.org"]}}), &[]);
        assert!(xml.contains(
            "<name>cc</name><value><struct><member><name>add</name><value><array><data><value><string>a@example.org</string></value></data></array></value></member></struct></value>"
        ));
    }
}
