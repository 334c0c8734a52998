use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};
use tokio::io::AsyncBufRead;

/// A decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    Fault { code: i64, message: String },
}

/// Containers open at the current point of the document.
enum Frame {
    Value(Option<Value>),
    Struct(Map<String, Value>),
    Member { name: String, value: Option<Value> },
    Array(Vec<Value>),
}

#[derive(Default)]
struct Unmarshaller {
    stack: Vec<Frame>,
    text: String,
    result: Option<Value>,
    fault: bool,
}

fn malformed(detail: impl std::fmt::Display) -> Error {
    Error::protocol(format!("malformed XML-RPC reply: {}", detail))
}

impl Unmarshaller {
    fn start(&mut self, tag: &[u8]) {
        match tag {
            b"value" => {
                self.stack.push(Frame::Value(None));
                self.text.clear();
            }
            b"struct" => self.stack.push(Frame::Struct(Map::new())),
            b"member" => self.stack.push(Frame::Member {
                name: String::new(),
                value: None,
            }),
            b"array" => self.stack.push(Frame::Array(Vec::new())),
            b"fault" => self.fault = true,
            _ => self.text.clear(),
        }
    }

    fn end(&mut self, tag: &[u8]) -> Result<()> {
        match tag {
            b"value" => {
                let text = std::mem::take(&mut self.text);
                match self.stack.pop() {
                    // an untyped value is a string
                    Some(Frame::Value(value)) => self.deliver(value.unwrap_or(Value::String(text)))?,
                    _ => return Err(malformed("unbalanced </value>")),
                }
            }
            b"struct" => match self.stack.pop() {
                Some(Frame::Struct(map)) => self.set_value(Value::Object(map))?,
                _ => return Err(malformed("unbalanced </struct>")),
            },
            b"array" => match self.stack.pop() {
                Some(Frame::Array(items)) => self.set_value(Value::Array(items))?,
                _ => return Err(malformed("unbalanced </array>")),
            },
            b"member" => match (self.stack.pop(), self.stack.last_mut()) {
                (Some(Frame::Member { name, value }), Some(Frame::Struct(map))) => {
                    map.insert(name, value.unwrap_or(Value::Null));
                }
                _ => return Err(malformed("member outside of a struct")),
            },
            b"name" => match self.stack.last_mut() {
                Some(Frame::Member { name, .. }) => *name = std::mem::take(&mut self.text),
                _ => return Err(malformed("name outside of a member")),
            },
            b"i4" | b"int" | b"i8" => {
                let number: i64 = self.text.trim().parse().map_err(malformed)?;
                self.set_value(Value::from(number))?;
            }
            b"double" => {
                let number: f64 = self.text.trim().parse().map_err(malformed)?;
                let number = Number::from_f64(number).ok_or_else(|| malformed("non-finite double"))?;
                self.set_value(Value::Number(number))?;
            }
            b"boolean" => {
                let flag = match self.text.trim() {
                    "1" | "true" => true,
                    "0" | "false" => false,
                    other => return Err(malformed(format!("invalid boolean {:?}", other))),
                };
                self.set_value(Value::Bool(flag))?;
            }
            b"string" => {
                let text = std::mem::take(&mut self.text);
                self.set_value(Value::String(text))?;
            }
            b"dateTime.iso8601" => {
                let text = self.text.trim().to_string();
                self.set_value(Value::String(text))?;
            }
            b"base64" => {
                let compact: String = self.text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                self.set_value(Value::String(compact))?;
            }
            b"nil" => self.set_value(Value::Null)?,
            _ => {}
        }
        Ok(())
    }

    /// Record the typed content of the innermost `<value>`.
    fn set_value(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Value(slot)) => {
                *slot = Some(value);
                Ok(())
            }
            _ => Err(malformed("typed data outside of a value")),
        }
    }

    /// Hand a finished `<value>` to its container.
    fn deliver(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            Some(Frame::Member { value: slot, .. }) => *slot = Some(value),
            Some(Frame::Array(items)) => items.push(value),
            Some(_) => return Err(malformed("value in an unexpected position")),
            None => {
                if self.result.is_none() {
                    self.result = Some(value);
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Reply> {
        let value = self.result.ok_or_else(|| malformed("no value in reply"))?;
        if !self.fault {
            return Ok(Reply::Value(value));
        }
        let code = value.get("faultCode").and_then(Value::as_i64).unwrap_or_default();
        let message = value
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Reply::Fault { code, message })
    }
}

/// Decode a `methodResponse` incrementally from a buffered async reader.
pub async fn decode_stream<R: AsyncBufRead + Unpin>(source: R) -> Result<Reply> {
    let mut reader = Reader::from_reader(source);
    reader.expand_empty_elements(true);
    let mut state = Unmarshaller::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into_async(&mut buf).await.map_err(malformed)? {
            Event::Start(e) => state.start(e.name().as_ref()),
            Event::End(e) => state.end(e.name().as_ref())?,
            Event::Text(e) => state.text.push_str(&e.unescape().map_err(malformed)?),
            Event::CData(e) => state.text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn decode(xml: &str) -> Result<Reply> {
        decode_stream(xml.as_bytes()).await
    }

    #[tokio::test]
    async fn test_decode_struct_reply() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<methodResponse><params><param><value><struct>
  <member><name>bugs</name><value><array><data>
    <value><struct>
      <member><name>id</name><value><int>42</int></value></member>
      <member><name>summary</name><value><string>a &amp; b</string></value></member>
      <member><name>is_open</name><value><boolean>1</boolean></value></member>
      <member><name>untyped</name><value>plain</value></member>
      <member><name>empty</name><value><string/></value></member>
      <member><name>when</name><value><dateTime.iso8601>20170304T12:30:00</dateTime.iso8601></value></member>
      <member><name>hours</name><value><double>1.5</double></value></member>
      <member><name>nothing</name><value><nil/></value></member>
    </struct></value>
  </data></array></value></member>
</struct></value></param></params></methodResponse>"#;
        let reply = decode(xml).await.unwrap();
        assert_eq!(
            reply,
            Reply::Value(json!({
                "bugs": [{
                    "id": 42,
                    "summary": "a & b",
                    "is_open": true,
                    "untyped": "plain",
                    "empty": "",
                    "when": "20170304T12:30:00",
                    "hours": 1.5,
                    "nothing": null,
                }]
            }))
        );
    }

    #[tokio::test]
    async fn test_decode_base64_strips_whitespace() {
        let xml = "<methodResponse><params><param><value><base64>aGVs\n  bG8=</base64></value></param></params></methodResponse>";
        assert_eq!(decode(xml).await.unwrap(), Reply::Value(json!("aGVsbG8=")));
    }

    #[tokio::test]
    async fn test_decode_fault() {
        let xml = r#"<methodResponse><fault><value><struct>
<member><name>faultString</name><value><string>You must log in before using this part of Bugzilla.</string></value></member>
<member><name>faultCode</name><value><int>410</int></value></member>
</struct></value></fault></methodResponse>"#;
        assert_eq!(
            decode(xml).await.unwrap(),
            Reply::Fault {
                code: 410,
                message: "You must log in before using this part of Bugzilla.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_decode_rejects_garbage() {
        assert!(decode("<html><body>Service unavailable</body></html>").await.is_err());
        assert!(decode("<methodResponse><params><param><value><int>x</int></value></param></params></methodResponse>")
            .await
            .is_err());
    }
}
