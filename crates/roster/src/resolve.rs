use crate::model::{IdentityIndex, SourceRecord, StudentId};
use crate::schema::AttributeSchema;

/// Work out which student a record belongs to.
///
/// The primary identifier wins outright. Otherwise the record's secondary
/// identifiers are looked up in schema order and the first linked value wins.
/// `None` means none of the record's keys has been linked yet; a later pass
/// may still resolve it.
pub fn resolve(
    schema: &AttributeSchema,
    record: &SourceRecord,
    index: &IdentityIndex,
) -> Option<StudentId> {
    if let Some(id) = record.attributes.get(schema.primary()) {
        return Some(StudentId::new(id.clone()));
    }

    schema.secondary_identifiers().find_map(|attribute| {
        record
            .attributes
            .get(attribute)
            .and_then(|value| index.lookup(attribute, value))
            .cloned()
    })
}
