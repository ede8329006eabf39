use serde::{Deserialize, Serialize};

/// JVM access flag for `public`.
pub const ACC_PUBLIC: u32 = 0x0001;
/// JVM access flag for `protected`.
pub const ACC_PROTECTED: u32 = 0x0004;
/// JVM access flag for `interface`.
pub const ACC_INTERFACE: u32 = 0x0200;

/// A field or method visible in a class's ABI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberSignature {
    pub name: String,
    /// JVM type descriptor, e.g. `(Ljava/lang/String;)V`.
    pub descriptor: String,
    pub access: u32,
}

impl MemberSignature {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: u32) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access,
        }
    }
}

/// The externally visible shape of one compiled class.
///
/// Only ABI-relevant information is kept: method bodies and private members
/// never reach a node, so a body-only edit leaves the node byte-identical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    /// Internal class name, e.g. `com/example/Foo`.
    pub name: String,
    pub access: u32,
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<MemberSignature>,
    #[serde(default)]
    pub methods: Vec<MemberSignature>,
    /// Descriptors of runtime-visible annotations on the class.
    #[serde(default)]
    pub annotations: Vec<String>,
}

impl ClassNode {
    /// A public class with no supertypes and no members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: ACC_PUBLIC,
            superclass: Some("java/lang/Object".into()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: MemberSignature) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_field(mut self, field: MemberSignature) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn is_interface(&self) -> bool {
        self.access & ACC_INTERFACE != 0
    }

    /// Sort members so that declaration order does not affect the encoded record.
    pub fn normalize(&mut self) {
        self.interfaces.sort();
        self.fields.sort();
        self.methods.sort();
        self.annotations.sort();
    }

    /// Dotted source-level name, e.g. `com.example.Foo`.
    pub fn display_name(&self) -> String {
        self.name.replace('/', ".")
    }
}
