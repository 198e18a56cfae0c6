//! Form sections and the custom fields inside them.

use db::{
    models::{
        custom_field::{CreateCustomField, CustomField, FieldType, UpdateCustomField},
        form_section::{
            CreateFormSection, EntityType, FormSection, FormSectionWithFields, UpdateFormSection,
        },
    },
    ordering::{ReorderStoreError, Scope},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::{normalize_name, reorder::ReorderService};

#[derive(Debug, Error)]
pub enum FormSectionServiceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Store(#[from] ReorderStoreError),
    #[error("form section not found")]
    SectionNotFound,
    #[error("custom field not found")]
    FieldNotFound,
    #[error("validation error: {0}")]
    Validation(String),
}

pub struct FormSectionService;

impl FormSectionService {
    pub async fn list(
        pool: &SqlitePool,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<FormSectionWithFields>, FormSectionServiceError> {
        let sections = FormSection::find_all(pool, entity_type).await?;
        let mut result = Vec::with_capacity(sections.len());
        for section in sections {
            let fields = CustomField::find_by_section_id(pool, section.id).await?;
            result.push(FormSectionWithFields { section, fields });
        }
        Ok(result)
    }

    pub async fn get(
        pool: &SqlitePool,
        section_id: Uuid,
    ) -> Result<FormSectionWithFields, FormSectionServiceError> {
        let section = FormSection::find_by_id(pool, section_id)
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)?;
        let fields = CustomField::find_by_section_id(pool, section.id).await?;
        Ok(FormSectionWithFields { section, fields })
    }

    /// Sections are ordered per entity type, so the section's scope depends on it
    pub async fn section_scope(
        pool: &SqlitePool,
        section_id: Uuid,
    ) -> Result<Scope, FormSectionServiceError> {
        let section = FormSection::find_by_id(pool, section_id)
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)?;
        Ok(Scope::FormSections {
            entity_type: section.entity_type,
        })
    }

    pub async fn create(
        pool: &SqlitePool,
        data: CreateFormSection,
    ) -> Result<FormSection, FormSectionServiceError> {
        let name = normalize_name(&data.name).ok_or_else(|| {
            FormSectionServiceError::Validation("section name is required".into())
        })?;

        let mut tx = db::begin_write(pool).await?;
        let scope = Scope::FormSections {
            entity_type: data.entity_type,
        };
        let order = scope.count(&mut *tx).await?;
        let section = FormSection::create(
            &mut *tx,
            Uuid::new_v4(),
            &CreateFormSection { name, ..data },
            order,
        )
        .await?;
        tx.commit().await?;

        info!(
            section_id = %section.id,
            entity_type = %section.entity_type,
            order,
            "Created form section"
        );
        Ok(section)
    }

    pub async fn update(
        pool: &SqlitePool,
        section_id: Uuid,
        data: UpdateFormSection,
    ) -> Result<FormSection, FormSectionServiceError> {
        let name = match data.name.as_deref() {
            Some(name) => Some(normalize_name(name).ok_or_else(|| {
                FormSectionServiceError::Validation("section name cannot be empty".into())
            })?),
            None => None,
        };
        FormSection::update(pool, section_id, &UpdateFormSection { name })
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)
    }

    /// Soft delete a section together with its fields, then compact the entity type's sections
    pub async fn delete(pool: &SqlitePool, section_id: Uuid) -> Result<(), FormSectionServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let section = FormSection::find_by_id(&mut *tx, section_id)
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)?;
        FormSection::soft_delete(&mut *tx, section.id).await?;
        let fields_deleted = CustomField::soft_delete_by_section_id(&mut *tx, section.id).await?;
        ReorderService::compact_in(
            &mut tx,
            Scope::FormSections {
                entity_type: section.entity_type,
            },
        )
        .await?;
        tx.commit().await?;

        info!(section_id = %section_id, fields_deleted, "Deleted form section");
        Ok(())
    }

    pub async fn get_field(
        pool: &SqlitePool,
        field_id: Uuid,
    ) -> Result<CustomField, FormSectionServiceError> {
        CustomField::find_by_id(pool, field_id)
            .await?
            .ok_or(FormSectionServiceError::FieldNotFound)
    }

    /// Append a field to the section
    pub async fn create_field(
        pool: &SqlitePool,
        section_id: Uuid,
        data: CreateCustomField,
    ) -> Result<CustomField, FormSectionServiceError> {
        let name = normalize_name(&data.name)
            .ok_or_else(|| FormSectionServiceError::Validation("field name is required".into()))?;
        validate_options(data.field_type, data.options.as_deref())?;

        let mut tx = db::begin_write(pool).await?;
        FormSection::find_by_id(&mut *tx, section_id)
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)?;
        let order = Scope::CustomFields { section_id }.count(&mut *tx).await?;
        let field = CustomField::create(
            &mut *tx,
            Uuid::new_v4(),
            section_id,
            &CreateCustomField { name, ..data },
            order,
        )
        .await?;
        tx.commit().await?;

        info!(section_id = %section_id, field_id = %field.id, order, "Created custom field");
        Ok(field)
    }

    pub async fn update_field(
        pool: &SqlitePool,
        field_id: Uuid,
        data: UpdateCustomField,
    ) -> Result<CustomField, FormSectionServiceError> {
        let current = CustomField::find_by_id(pool, field_id)
            .await?
            .ok_or(FormSectionServiceError::FieldNotFound)?;
        let name = match data.name.as_deref() {
            Some(name) => Some(normalize_name(name).ok_or_else(|| {
                FormSectionServiceError::Validation("field name cannot be empty".into())
            })?),
            None => None,
        };
        let field_type = data.field_type.unwrap_or(current.field_type);
        let options = data.options.as_deref().or(current.options.as_deref());
        validate_options(field_type, options)?;

        CustomField::update(pool, field_id, &UpdateCustomField { name, ..data })
            .await?
            .ok_or(FormSectionServiceError::FieldNotFound)
    }

    /// Soft delete a field and compact its section
    pub async fn delete_field(pool: &SqlitePool, field_id: Uuid) -> Result<(), FormSectionServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let field = CustomField::find_by_id(&mut *tx, field_id)
            .await?
            .ok_or(FormSectionServiceError::FieldNotFound)?;
        CustomField::soft_delete(&mut *tx, field.id).await?;
        ReorderService::compact_in(
            &mut tx,
            Scope::CustomFields {
                section_id: field.section_id,
            },
        )
        .await?;
        tx.commit().await?;

        info!(field_id = %field_id, section_id = %field.section_id, "Deleted custom field");
        Ok(())
    }

    /// Move a field to the end of another section of the same entity type and close
    /// the gap it leaves behind.
    pub async fn move_field(
        pool: &SqlitePool,
        field_id: Uuid,
        target_section_id: Uuid,
    ) -> Result<CustomField, FormSectionServiceError> {
        let mut tx = db::begin_write(pool).await?;
        let field = CustomField::find_by_id(&mut *tx, field_id)
            .await?
            .ok_or(FormSectionServiceError::FieldNotFound)?;
        if field.section_id == target_section_id {
            return Ok(field);
        }

        let source = FormSection::find_by_id(&mut *tx, field.section_id)
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)?;
        let target = FormSection::find_by_id(&mut *tx, target_section_id)
            .await?
            .ok_or(FormSectionServiceError::SectionNotFound)?;
        if source.entity_type != target.entity_type {
            return Err(FormSectionServiceError::Validation(format!(
                "cannot move a {} field into a {} section",
                source.entity_type, target.entity_type
            )));
        }

        let order = Scope::CustomFields {
            section_id: target.id,
        }
        .count(&mut *tx)
        .await?;
        let moved = CustomField::move_to_section(&mut *tx, field.id, target.id, order)
            .await?
            .ok_or(FormSectionServiceError::FieldNotFound)?;
        ReorderService::compact_in(
            &mut tx,
            Scope::CustomFields {
                section_id: source.id,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            field_id = %field_id,
            from = %source.id,
            to = %target.id,
            order,
            "Moved custom field"
        );
        Ok(moved)
    }
}

fn validate_options(
    field_type: FieldType,
    options: Option<&[String]>,
) -> Result<(), FormSectionServiceError> {
    if field_type != FieldType::Select {
        return Ok(());
    }
    match options {
        Some(options) if !options.is_empty() => {
            if options.iter().any(|o| o.trim().is_empty()) {
                return Err(FormSectionServiceError::Validation(
                    "select options cannot be blank".into(),
                ));
            }
            Ok(())
        }
        _ => Err(FormSectionServiceError::Validation(
            "select fields need at least one option".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use db::{DBService, ordering::is_dense};

    use super::*;

    async fn section(db: &DBService, name: &str, entity_type: EntityType) -> FormSection {
        FormSectionService::create(
            &db.pool,
            CreateFormSection {
                name: name.to_string(),
                entity_type,
            },
        )
        .await
        .unwrap()
    }

    fn text_field(name: &str) -> CreateCustomField {
        CreateCustomField {
            name: name.to_string(),
            field_type: FieldType::Text,
            required: None,
            full_width: None,
            multiple_select: None,
            options: None,
        }
    }

    #[tokio::test]
    async fn test_sections_are_numbered_per_entity_type() {
        let db = DBService::new_in_memory().await.unwrap();
        let company = section(&db, "Basics", EntityType::Company).await;
        let contact = section(&db, "Basics", EntityType::Contact).await;
        let company2 = section(&db, "Billing", EntityType::Company).await;

        assert_eq!(company.order, 0);
        assert_eq!(contact.order, 0);
        assert_eq!(company2.order, 1);

        let listed = FormSectionService::list(&db.pool, Some(EntityType::Company))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.section.entity_type == EntityType::Company));

        let scope = FormSectionService::section_scope(&db.pool, contact.id).await.unwrap();
        assert_eq!(
            scope,
            Scope::FormSections {
                entity_type: EntityType::Contact
            }
        );
    }

    #[tokio::test]
    async fn test_select_field_requires_options() {
        let db = DBService::new_in_memory().await.unwrap();
        let s = section(&db, "Basics", EntityType::Company).await;

        let err = FormSectionService::create_field(
            &db.pool,
            s.id,
            CreateCustomField {
                field_type: FieldType::Select,
                ..text_field("Tier")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FormSectionServiceError::Validation(_)));

        let field = FormSectionService::create_field(
            &db.pool,
            s.id,
            CreateCustomField {
                field_type: FieldType::Select,
                options: Some(vec!["Gold".into(), "Silver".into()]),
                ..text_field("Tier")
            },
        )
        .await
        .unwrap();
        assert_eq!(field.options.as_deref(), Some(&["Gold".to_string(), "Silver".to_string()][..]));

        // Switching a text field to select without options is rejected
        let plain = FormSectionService::create_field(&db.pool, s.id, text_field("Notes"))
            .await
            .unwrap();
        let err = FormSectionService::update_field(
            &db.pool,
            plain.id,
            UpdateCustomField {
                field_type: Some(FieldType::Select),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FormSectionServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_move_field_appends_and_compacts_source() {
        let db = DBService::new_in_memory().await.unwrap();
        let source = section(&db, "Basics", EntityType::Company).await;
        let target = section(&db, "Extra", EntityType::Company).await;
        let a = FormSectionService::create_field(&db.pool, source.id, text_field("A")).await.unwrap();
        let b = FormSectionService::create_field(&db.pool, source.id, text_field("B")).await.unwrap();
        FormSectionService::create_field(&db.pool, target.id, text_field("X")).await.unwrap();

        let moved = FormSectionService::move_field(&db.pool, a.id, target.id).await.unwrap();
        assert_eq!(moved.section_id, target.id);
        assert_eq!(moved.order, 1);

        let source_fields = FormSectionService::get(&db.pool, source.id).await.unwrap().fields;
        assert_eq!(source_fields.len(), 1);
        assert_eq!((source_fields[0].id, source_fields[0].order), (b.id, 0));

        let target_fields = FormSectionService::get(&db.pool, target.id).await.unwrap().fields;
        assert!(is_dense(&target_fields));
    }

    #[tokio::test]
    async fn test_move_field_rejects_other_entity_type() {
        let db = DBService::new_in_memory().await.unwrap();
        let company = section(&db, "Basics", EntityType::Company).await;
        let contact = section(&db, "Basics", EntityType::Contact).await;
        let field = FormSectionService::create_field(&db.pool, company.id, text_field("A"))
            .await
            .unwrap();

        let err = FormSectionService::move_field(&db.pool, field.id, contact.id)
            .await
            .unwrap_err();
        assert!(matches!(err, FormSectionServiceError::Validation(_)));
        assert_eq!(
            FormSectionService::get_field(&db.pool, field.id).await.unwrap().section_id,
            company.id
        );
    }

    #[tokio::test]
    async fn test_delete_section_removes_fields_and_compacts() {
        let db = DBService::new_in_memory().await.unwrap();
        let first = section(&db, "First", EntityType::Contact).await;
        let second = section(&db, "Second", EntityType::Contact).await;
        let field = FormSectionService::create_field(&db.pool, first.id, text_field("A"))
            .await
            .unwrap();

        FormSectionService::delete(&db.pool, first.id).await.unwrap();

        let remaining = FormSectionService::list(&db.pool, Some(EntityType::Contact))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!((remaining[0].section.id, remaining[0].section.order), (second.id, 0));
        assert!(matches!(
            FormSectionService::get_field(&db.pool, field.id).await.unwrap_err(),
            FormSectionServiceError::FieldNotFound
        ));
    }
}
