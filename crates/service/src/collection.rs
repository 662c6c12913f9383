//! CRUD semantics over a fully materialized collection snapshot.
//!
//! Nothing here does I/O; stores load a `Collection`, run one operation
//! and persist the result.

use crate::errors::ServiceError;
use crate::ids::IdStrategy;
use crate::record::{Record, RecordFields, RecordFilter, RecordId};

/// Records in creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    records: Vec<Record>,
}

impl From<Vec<Record>> for Collection {
    fn from(records: Vec<Record>) -> Self { Self { records } }
}

impl Collection {
    pub fn records(&self) -> &[Record] { &self.records }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Matching records in collection order.
    pub fn list(&self, filter: &RecordFilter) -> Vec<Record> {
        self.records.iter().filter(|r| filter.matches(r)).cloned().collect()
    }

    /// Append a new record. All fields are required and `product` must be unused.
    pub fn create(&mut self, fields: RecordFields, ids: &dyn IdStrategy) -> Result<Record, ServiceError> {
        fields.require_complete()?;
        if let Some(product) = fields.product.as_deref() {
            if self.records.iter().any(|r| r.product == product) {
                return Err(ServiceError::Conflict(format!("product '{product}' already exists")));
            }
        }
        let record = fields.into_record(ids.next_id(&self.records)?)?;
        self.records.push(record.clone());
        Ok(record)
    }

    /// Replace every data field of record `id`; the id itself is kept.
    pub fn replace(&mut self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError> {
        let idx = self.position(id)?;
        let record = fields.into_record(self.records[idx].id.clone())?;
        self.records[idx] = record.clone();
        Ok(record)
    }

    /// Overwrite the supplied fields of record `id`.
    pub fn update(&mut self, id: &RecordId, fields: RecordFields) -> Result<Record, ServiceError> {
        let idx = self.position(id)?;
        let record = &mut self.records[idx];
        fields.apply_to(record);
        Ok(record.clone())
    }

    pub fn delete(&mut self, id: &RecordId) -> Result<Record, ServiceError> {
        let idx = self.position(id)?;
        Ok(self.records.remove(idx))
    }

    fn position(&self, id: &RecordId) -> Result<usize, ServiceError> {
        self.records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| ServiceError::not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{SequentialIds, UuidIds};

    fn fields(product: &str, amount: f64, price: f64, shop: &str, todate: &str) -> RecordFields {
        RecordFields {
            id: None,
            product: Some(product.into()),
            amount: Some(amount),
            price: Some(price),
            shop: Some(shop.into()),
            todate: Some(todate.into()),
        }
    }

    fn rice() -> RecordFields {
        fields("rice", 5.0, 100.0, "A", "2025-01-01")
    }

    fn seeded() -> Collection {
        let mut c = Collection::default();
        c.create(rice(), &SequentialIds).unwrap();
        c.create(fields("tea", 2.0, 80.0, "B", "2025-02-01"), &SequentialIds).unwrap();
        c.create(fields("salt", 1.0, 20.0, "A", "2025-03-01"), &SequentialIds).unwrap();
        c
    }

    #[test]
    fn create_on_empty_collection_assigns_id_one() {
        let mut c = Collection::default();
        let created = c.create(rice(), &SequentialIds).unwrap();
        assert_eq!(created.id, RecordId::Seq(1));
        assert_eq!(created.product, "rice");
        assert_eq!(created.amount, 5.0);
        assert_eq!(created.price, 100.0);
        assert_eq!(created.shop, "A");
        assert_eq!(created.todate, "2025-01-01");
        assert_eq!(c.records(), &[created]);
    }

    #[test]
    fn create_assigns_one_past_the_maximum() {
        let mut c = seeded();
        c.delete(&RecordId::Seq(2)).unwrap();
        let created = c.create(fields("milk", 1.0, 50.0, "C", "2025-04-01"), &SequentialIds).unwrap();
        assert_eq!(created.id, RecordId::Seq(4));
    }

    #[test]
    fn duplicate_product_conflicts_and_leaves_collection_unchanged() {
        let mut c = seeded();
        let before = c.clone();
        let err = c.create(fields("rice", 1.0, 1.0, "Z", "2030-01-01"), &SequentialIds).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(c, before);
    }

    #[test]
    fn exhausted_id_space_fails_without_duplicating_ids() {
        let top = fields("top", 1.0, 1.0, "A", "2025-01-01").into_record(RecordId::Seq(u64::MAX)).unwrap();
        let mut c = Collection::from(vec![top]);
        let before = c.clone();
        let err = c.create(rice(), &SequentialIds).unwrap_err();
        assert!(matches!(err, ServiceError::Backend(_)));
        assert_eq!(c, before);
    }

    #[test]
    fn incomplete_create_is_a_validation_error() {
        let mut c = seeded();
        let mut partial = rice();
        partial.shop = None;
        partial.product = Some("bread".into());
        let err = c.create(partial, &SequentialIds).unwrap_err();
        assert_eq!(err, ServiceError::Validation("missing required fields: shop".into()));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn validation_is_checked_before_uniqueness() {
        let mut c = seeded();
        let mut dup = rice();
        dup.todate = None;
        assert!(matches!(c.create(dup, &SequentialIds), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn create_with_uuid_strategy_yields_opaque_ids() {
        let mut c = seeded();
        let created = c.create(fields("oil", 1.0, 90.0, "B", "2025-05-01"), &UuidIds).unwrap();
        assert!(matches!(created.id, RecordId::Opaque(_)));
        // sequential numbering continues past opaque ids
        let next = c.create(fields("flour", 1.0, 30.0, "B", "2025-05-02"), &SequentialIds).unwrap();
        assert_eq!(next.id, RecordId::Seq(4));
    }

    #[test]
    fn replace_keeps_the_original_id() {
        let mut c = seeded();
        let mut body = fields("brown rice", 6.0, 120.0, "C", "2026-01-01");
        body.id = Some(RecordId::Seq(99));
        let replaced = c.replace(&RecordId::Seq(1), body).unwrap();
        assert_eq!(replaced.id, RecordId::Seq(1));
        assert_eq!(replaced.product, "brown rice");
        assert_eq!(c.records()[0], replaced);
        assert!(c.list(&RecordFilter { id: Some(RecordId::Seq(99)), ..Default::default() }).is_empty());
    }

    #[test]
    fn replace_requires_every_field() {
        let mut c = seeded();
        let before = c.clone();
        let partial = RecordFields { price: Some(1.0), ..Default::default() };
        assert!(matches!(c.replace(&RecordId::Seq(1), partial), Err(ServiceError::Validation(_))));
        assert_eq!(c, before);
    }

    #[test]
    fn update_overwrites_only_supplied_fields() {
        let mut c = seeded();
        let original = c.records()[1].clone();
        let patch = RecordFields { id: Some(RecordId::Seq(7)), price: Some(999.0), ..Default::default() };
        let updated = c.update(&RecordId::Seq(2), patch).unwrap();
        assert_eq!(updated.id, RecordId::Seq(2));
        assert_eq!(updated.price, 999.0);
        assert_eq!(updated.product, original.product);
        assert_eq!(updated.amount, original.amount);
        assert_eq!(updated.shop, original.shop);
        assert_eq!(updated.todate, original.todate);
    }

    #[test]
    fn update_does_not_enforce_product_uniqueness() {
        let mut c = seeded();
        let patch = RecordFields { product: Some("rice".into()), ..Default::default() };
        let updated = c.update(&RecordId::Seq(3), patch).unwrap();
        assert_eq!(updated.product, "rice");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut c = seeded();
        let missing = RecordId::Seq(42);
        assert_eq!(c.update(&missing, RecordFields::default()), Err(ServiceError::not_found(&missing)));
        assert!(matches!(c.replace(&missing, rice()), Err(ServiceError::NotFound(_))));
        assert!(matches!(c.delete(&missing), Err(ServiceError::NotFound(_))));
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn delete_removes_exactly_one_and_keeps_order() {
        let mut c = seeded();
        let removed = c.delete(&RecordId::Seq(1)).unwrap();
        assert_eq!(removed.product, "rice");
        let ids: Vec<_> = c.records().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![RecordId::Seq(2), RecordId::Seq(3)]);
    }

    #[test]
    fn list_without_filters_returns_everything_in_order() {
        let c = seeded();
        assert_eq!(c.list(&RecordFilter::default()), c.records().to_vec());
    }

    #[test]
    fn list_with_filters_returns_the_matching_subsequence() {
        let c = seeded();
        let shop_a = c.list(&RecordFilter { shop: Some("A".into()), ..Default::default() });
        let products: Vec<_> = shop_a.iter().map(|r| r.product.as_str()).collect();
        assert_eq!(products, vec!["rice", "salt"]);

        let narrowed = c.list(&RecordFilter {
            shop: Some("A".into()),
            price: Some(20.0),
            ..Default::default()
        });
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].product, "salt");

        let none = c.list(&RecordFilter { amount: Some(3.0), ..Default::default() });
        assert!(none.is_empty());
    }
}
