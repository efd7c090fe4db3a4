//! Schema descriptors: the top-level unit corresponding to one `.proto` file.

use alloc::string::String;
use alloc::vec::Vec;

/// The `syntax = "..."` marker at the top of a `.proto` file. Only `Proto2` is
/// accepted by [`Registry::register_schema`](crate::descriptor::Registry::register_schema):
/// proto3 semantics are an explicit non-goal of this codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    Proto2,
}

/// Describes one source file's worth of declarations: its package, the other
/// schemas it imports, and the qualified names of the messages, enums, and
/// services it declares at the top level (nested messages and enums are reached
/// through their parent, not listed here).
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    syntax: Syntax,
    package: String,
    imports: Vec<String>,
    messages: Vec<String>,
    enums: Vec<String>,
    services: Vec<String>,
}

impl Schema {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            syntax: Syntax::Proto2,
            package: package.into(),
            imports: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_messages(mut self, messages: Vec<String>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_enums(mut self, enums: Vec<String>) -> Self {
        self.enums = enums;
        self
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn enums(&self) -> &[String] {
        &self.enums
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }
}
