//! Service and method descriptors.
//!
//! These exist purely as data the RPC layer (out of scope for this crate) consumes
//! at the boundary; the codec itself never special-cases a method's input or
//! output; they are encoded and decoded as ordinary messages.

use alloc::string::String;
use alloc::vec::Vec;

/// One RPC method of a [`ServiceDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    index: u32,
    /// Qualified name of the input message.
    input: String,
    /// Qualified name of the output message.
    output: String,
    client_streaming: bool,
    server_streaming: bool,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        index: u32,
        input: impl Into<String>,
        output: impl Into<String>,
        client_streaming: bool,
        server_streaming: bool,
    ) -> Self {
        MethodDescriptor {
            name: name.into(),
            index,
            input: input.into(),
            output: output.into(),
            client_streaming,
            server_streaming,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn client_streaming(&self) -> bool {
        self.client_streaming
    }

    pub fn server_streaming(&self) -> bool {
        self.server_streaming
    }
}

/// Describes a protobuf service: a named collection of RPC methods.
#[derive(Clone, Debug)]
pub struct ServiceDescriptor {
    name: String,
    schema: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, schema: impl Into<String>, methods: Vec<MethodDescriptor>) -> Self {
        ServiceDescriptor {
            name: name.into(),
            schema: schema.into(),
            methods,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn qualified_name(&self) -> String {
        alloc::format!("{}.{}", self.schema, self.name)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method_by_name(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name() == name)
    }
}
