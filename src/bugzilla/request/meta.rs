use super::{join_ids, Request};
use crate::error::{Error, Result};
use crate::rpc::RpcCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ids, names or match patterns picking out server objects.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub ids: Vec<u64>,
    pub names: Vec<String>,
    /// Substring patterns; only `User.get` supports these
    pub matches: Vec<String>,
}

impl Selector {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty() && self.matches.is_empty()
    }

    fn apply(&self, mut call: RpcCall, options: &mut Vec<String>) -> RpcCall {
        if !self.ids.is_empty() {
            call = call.param("ids", self.ids.clone());
            options.push(format!("IDs: {}", join_ids(&self.ids)));
        }
        if !self.names.is_empty() {
            call = call.param("names", self.names.clone());
            options.push(format!("Names: {}", self.names.join(", ")));
        }
        if !self.matches.is_empty() {
            call = call.param("match", self.matches.clone());
            options.push(format!("Matching: {}", self.matches.join(", ")));
        }
        call
    }
}

fn field<'a>(data: &'a Value, name: &str) -> Result<&'a Value> {
    data.get(name)
        .ok_or_else(|| Error::protocol(format!("reply is missing {}", name)))
}

/// `Bugzilla.version`
pub struct VersionRequest {
    call: RpcCall,
}

impl VersionRequest {
    pub fn new() -> Self {
        Self {
            call: RpcCall::new("Bugzilla.version"),
        }
    }
}

impl Default for VersionRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl Request for VersionRequest {
    type Output = String;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &[]
    }

    fn parse(&self, data: Value) -> Result<String> {
        field(&data, "version")?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::protocol("version is not a string"))
    }
}

/// `Bugzilla.extensions`: installed extension names and versions.
pub struct ExtensionsRequest {
    call: RpcCall,
}

impl ExtensionsRequest {
    pub fn new() -> Self {
        Self {
            call: RpcCall::new("Bugzilla.extensions"),
        }
    }
}

impl Default for ExtensionsRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl Request for ExtensionsRequest {
    type Output = BTreeMap<String, String>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &[]
    }

    fn parse(&self, data: Value) -> Result<BTreeMap<String, String>> {
        let extensions = field(&data, "extensions")?
            .as_object()
            .ok_or_else(|| Error::protocol("extensions is not a struct"))?;
        Ok(extensions
            .iter()
            .map(|(name, info)| {
                let version = info
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                (name.clone(), version)
            })
            .collect())
    }
}

/// `Bug.fields`: definitions of the fields a server knows about.
pub struct FieldsRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl FieldsRequest {
    pub fn new(selector: &Selector) -> Result<Self> {
        if !selector.matches.is_empty() {
            return Err(Error::validation("fields can't be looked up by pattern"));
        }
        let mut options = Vec::new();
        let call = selector.apply(RpcCall::new("Bug.fields"), &mut options);
        Ok(Self { call, options })
    }
}

impl Request for FieldsRequest {
    type Output = Vec<Value>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Value>> {
        match data.get("fields") {
            Some(Value::Array(fields)) => Ok(fields.clone()),
            _ => Err(Error::protocol("reply is missing fields")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// `Product.get`; without a selector, every product the user can access.
pub struct ProductsRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl ProductsRequest {
    pub fn new(selector: &Selector) -> Result<Self> {
        if !selector.matches.is_empty() {
            return Err(Error::validation("products can't be looked up by pattern"));
        }
        let mut options = Vec::new();
        let mut call = selector.apply(RpcCall::new("Product.get"), &mut options);
        if selector.is_empty() {
            call = call.param("type", vec!["accessible"]);
            options.push("Products: accessible".to_string());
        }
        Ok(Self { call, options })
    }
}

impl Request for ProductsRequest {
    type Output = Vec<Product>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<Product>> {
        let products = field(&data, "products")?.clone();
        serde_json::from_value(products).map_err(|e| Error::protocol(format!("malformed product: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub can_login: Option<bool>,
}

/// `User.get`
pub struct UsersRequest {
    call: RpcCall,
    options: Vec<String>,
}

impl UsersRequest {
    pub fn new(selector: &Selector) -> Result<Self> {
        if selector.is_empty() {
            return Err(Error::validation("No user IDs, names or match patterns specified"));
        }
        let mut options = Vec::new();
        let call = selector.apply(RpcCall::new("User.get"), &mut options);
        Ok(Self { call, options })
    }
}

impl Request for UsersRequest {
    type Output = Vec<User>;

    fn call(&self) -> &RpcCall {
        &self.call
    }

    fn options(&self) -> &[String] {
        &self.options
    }

    fn parse(&self, data: Value) -> Result<Vec<User>> {
        let users = field(&data, "users")?.clone();
        serde_json::from_value(users).map_err(|e| Error::protocol(format!("malformed user: {}", e)))
    }
}
