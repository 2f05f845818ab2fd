pub mod error;
pub mod intern_root;
pub mod polymorphic;
pub mod serialization_ctx;
pub mod serializers;
pub mod value_serializer;
