use std::{collections::HashMap, fmt, sync::Arc};

use ripple_serde::{ByteReader, ByteWriter};

use crate::{
    identity::identities::Identities,
    serialization::{
        error::SerializationError, intern_root::InternRoot, polymorphic::PolyBox,
        serializers::Serializers,
    },
};

/// Everything a serializer may consult: the polymorphic registry, the intern domains
/// visible from the current protocol and that protocol's identities.
#[derive(Clone)]
pub struct SerializationCtx {
    serializers: Arc<Serializers>,
    intern_roots: Arc<HashMap<String, Arc<InternRoot>>>,
    identities: Option<Arc<Identities>>,
}

impl SerializationCtx {
    pub fn new(serializers: Arc<Serializers>) -> Self {
        Self {
            serializers,
            intern_roots: Arc::new(HashMap::new()),
            identities: None,
        }
    }

    pub fn with_identities(mut self, identities: Arc<Identities>) -> Self {
        self.identities = Some(identities);
        self
    }

    pub fn serializers(&self) -> &Arc<Serializers> {
        &self.serializers
    }

    /// Identities of the protocol this context belongs to; entity values are identified with them
    pub fn identities(&self) -> Option<&Arc<Identities>> {
        self.identities.as_ref()
    }

    pub fn intern_root(&self, domain: &str) -> Option<Arc<InternRoot>> {
        self.intern_roots.get(domain).cloned()
    }

    /// A narrower context that additionally carries `root`. A root with the same domain name
    /// shadows the one inherited from `self`.
    pub fn with_intern_root(&self, root: Arc<InternRoot>) -> SerializationCtx {
        let mut intern_roots = (*self.intern_roots).clone();
        intern_roots.insert(root.domain().to_string(), root);
        Self {
            serializers: self.serializers.clone(),
            intern_roots: Arc::new(intern_roots),
            identities: self.identities.clone(),
        }
    }

    pub fn write_polymorphic(
        &self,
        writer: &mut ByteWriter,
        value: Option<&PolyBox>,
    ) -> Result<(), SerializationError> {
        self.serializers.write_polymorphic(self, writer, value)
    }

    pub fn read_polymorphic(
        &self,
        reader: &mut ByteReader,
    ) -> Result<Option<PolyBox>, SerializationError> {
        self.serializers.read_polymorphic(self, reader)
    }
}

impl fmt::Debug for SerializationCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut domains: Vec<&String> = self.intern_roots.keys().collect();
        domains.sort();
        f.debug_struct("SerializationCtx")
            .field("marshallers", &self.serializers.len())
            .field("intern_domains", &domains)
            .finish()
    }
}
