//! Session-level behavior: entity lifecycle, identity map, transaction
//! boundary and cache interplay, exercised through a small test entity.

use ontomap_connection::{
    AttributeSpec, Cardinality, Connection, Driver, EntityPrototype, EntityTypeSpec,
    ListAttributeSpec, Metamodel,
};
use ontomap_model::{
    config, Assertion, Axiom, AxiomDescriptor, AxiomValueDescriptor, DriverConfiguration, Literal,
    NamedResource, OntoError, Result, Value,
};
use ontomap_storage::{SecondLevelCache, SharedStorageConnector, StorageConnector};
use std::sync::Arc;

const COURSE_CLASS: &str = "http://example.org/Course";
const NAME_PROPERTY: &str = "http://example.org/name";
const MODULE_PROPERTY: &str = "http://example.org/hasModule";

#[derive(Debug, Clone, PartialEq)]
struct Course {
    key: NamedResource,
    name: String,
    modules: Vec<NamedResource>,
}

impl Course {
    fn new(key: &str, name: &str) -> Self {
        Course {
            key: NamedResource::new(key),
            name: name.to_owned(),
            modules: Vec::new(),
        }
    }

    fn with_modules(mut self, modules: &[&str]) -> Self {
        self.modules = modules.iter().copied().map(NamedResource::new).collect();
        self
    }
}

impl EntityPrototype for Course {
    fn type_name() -> &'static str {
        "Course"
    }

    fn entity_type() -> EntityTypeSpec {
        EntityTypeSpec {
            type_name: Self::type_name(),
            type_class: NamedResource::new(COURSE_CLASS),
            identifier_attribute: "key",
            attributes: vec![AttributeSpec {
                name: "name",
                assertion: Assertion::data_property(NAME_PROPERTY, false),
                cardinality: Cardinality::Single,
            }],
        }
    }

    fn key(&self) -> NamedResource {
        self.key.clone()
    }

    fn encode(&self, descriptor: &mut AxiomValueDescriptor) -> Result<()> {
        descriptor.add_value(
            Assertion::data_property(NAME_PROPERTY, false),
            Value::string(self.name.clone()),
        );
        Ok(())
    }

    fn decode(subject: &NamedResource, axioms: &[Axiom]) -> Result<Option<Self>> {
        let class = Value::reference(COURSE_CLASS);
        if !axioms
            .iter()
            .any(|a| a.assertion().is_class_assertion() && a.value() == &class)
        {
            return Ok(None);
        }
        let name = axioms
            .iter()
            .find_map(|a| match a.value() {
                Value::Literal {
                    value: Literal::String(s),
                    ..
                } if a.assertion().identifier().as_str() == NAME_PROPERTY => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_default();
        Ok(Some(Course {
            key: subject.clone(),
            name,
            modules: Vec::new(),
        }))
    }

    fn list_attributes() -> Vec<ListAttributeSpec> {
        vec![ListAttributeSpec::Simple {
            name: "modules",
            property: Assertion::object_property(MODULE_PROPERTY, false),
        }]
    }

    fn list_values(&self, attribute: &ListAttributeSpec) -> Vec<NamedResource> {
        match attribute.name() {
            "modules" => self.modules.clone(),
            _ => Vec::new(),
        }
    }

    fn set_list_values(&mut self, attribute: &ListAttributeSpec, values: Vec<NamedResource>) {
        if attribute.name() == "modules" {
            self.modules = values;
        }
    }
}

fn metamodel() -> Metamodel {
    let mut metamodel = Metamodel::new();
    metamodel.register::<Course>();
    metamodel
}

fn driver() -> Driver {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Driver::in_memory([], metamodel(), DriverConfiguration::new())
}

fn key(identifier: &str) -> NamedResource {
    NamedResource::new(identifier)
}

fn descriptor(identifier: &str) -> AxiomDescriptor {
    AxiomDescriptor::new(key(identifier))
}

// ============================================================================
// Identity and lifecycle
// ============================================================================

#[test]
fn repeated_finds_return_the_same_instance() {
    let driver = driver();
    let mut connection = driver.connect();
    let persisted = connection
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();

    assert!(connection.contains::<Course>(&key("urn:course:1")));
    let found = connection
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&persisted, &found));
}

#[test]
fn committed_entity_is_visible_to_a_new_connection() {
    let driver = driver();
    let mut writer = driver.connect();
    writer
        .persist(
            Course::new("urn:course:1", "Rust").with_modules(&["urn:mod:1", "urn:mod:2"]),
            None,
        )
        .unwrap();
    writer.commit().unwrap();

    let mut reader = driver.connect();
    let found = reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Rust");
    assert_eq!(
        found.modules,
        vec![key("urn:mod:1"), key("urn:mod:2")]
    );
}

#[test]
fn uncommitted_changes_are_invisible_to_other_connections() {
    let driver = driver();
    let mut writer = driver.connect();
    writer
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();

    let mut reader = driver.connect();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_none());

    writer.commit().unwrap();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_some());
}

#[test]
fn rollback_detaches_new_entities_and_leaves_no_trace() {
    let driver = driver();
    let mut connection = driver.connect();
    connection
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();
    connection.rollback().unwrap();

    assert!(!connection.contains::<Course>(&key("urn:course:1")));
    assert!(connection
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_none());
}

#[test]
fn persisting_an_existing_key_is_rejected() {
    let driver = driver();
    let mut connection = driver.connect();
    connection
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();

    let duplicate = connection.persist(Course::new("urn:course:1", "Other"), None);
    assert!(matches!(duplicate, Err(OntoError::AlreadyExists { .. })));

    // Also after commit, from a fresh connection.
    connection.commit().unwrap();
    let mut other = driver.connect();
    let duplicate = other.persist(Course::new("urn:course:1", "Other"), None);
    assert!(matches!(duplicate, Err(OntoError::AlreadyExists { .. })));
}

#[test]
fn closed_connection_rejects_every_operation() {
    let driver = driver();
    let mut connection = driver.connect();
    connection.close();

    assert!(!connection.is_open());
    assert!(matches!(connection.begin(), Err(OntoError::NotOpen)));
    assert!(matches!(
        connection.persist(Course::new("urn:course:1", "Rust"), None),
        Err(OntoError::NotOpen)
    ));
    assert!(matches!(
        connection.find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1")),
        Err(OntoError::NotOpen)
    ));
    assert!(matches!(connection.commit(), Err(OntoError::NotOpen)));
}

#[test]
fn close_rolls_back_the_active_transaction() {
    let driver = driver();
    let mut connection = driver.connect();
    connection
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();
    connection.close();

    let mut reader = driver.connect();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_none());
}

// ============================================================================
// Metamodel seam
// ============================================================================

#[test]
fn missing_metamodel_is_reported() {
    let central = Arc::new(SharedStorageConnector::default());
    let cache = Arc::new(SecondLevelCache::new());
    let mut connection = Connection::new(central, cache, &DriverConfiguration::new());

    let result = connection.persist(Course::new("urn:course:1", "Rust"), None);
    assert!(matches!(result, Err(OntoError::MetamodelNotSet)));
}

#[test]
fn unregistered_entity_type_is_rejected() {
    let driver = Driver::in_memory([], Metamodel::new(), DriverConfiguration::new());
    let mut connection = driver.connect();

    let result = connection.persist(Course::new("urn:course:1", "Rust"), None);
    assert!(matches!(result, Err(OntoError::InvalidArgument(_))));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn auto_commit_makes_changes_visible_without_explicit_commit() {
    let mut configuration = DriverConfiguration::new();
    configuration.set(config::AUTO_COMMIT, "true");
    let driver = Driver::in_memory([], metamodel(), configuration);

    let mut writer = driver.connect();
    writer
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();

    let mut reader = driver.connect();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_some());
}

#[test]
fn auto_commit_can_be_toggled_per_connection() {
    let driver = driver();
    let mut connection = driver.connect();
    assert!(!connection.auto_commit().unwrap());
    connection.set_auto_commit(true).unwrap();
    assert!(connection.auto_commit().unwrap());

    connection
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();
    let mut reader = driver.connect();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_some());
}

// ============================================================================
// Context routing
// ============================================================================

#[test]
fn entities_persisted_to_a_named_context_stay_out_of_the_default() {
    let ctx = NamedResource::new("urn:ctx:a");
    let driver = Driver::in_memory([ctx.clone()], metamodel(), DriverConfiguration::new());

    let mut writer = driver.connect();
    writer
        .persist(Course::new("urn:course:1", "Rust"), Some(ctx.clone()))
        .unwrap();
    writer.commit().unwrap();

    let mut reader = driver.connect();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_none());

    let mut scoped = descriptor("urn:course:1");
    scoped.set_subject_context(Some(ctx));
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &scoped)
        .unwrap()
        .is_some());
}

#[test]
fn unknown_context_is_rejected_on_persist() {
    let driver = driver();
    let mut connection = driver.connect();
    let result = connection.persist(
        Course::new("urn:course:1", "Rust"),
        Some(NamedResource::new("urn:ctx:missing")),
    );
    assert!(matches!(result, Err(OntoError::ContextNotFound { .. })));
}

#[test]
fn save_context_falls_back_to_the_configured_default() {
    let ctx = NamedResource::new("urn:ctx:a");
    let mut configuration = DriverConfiguration::new();
    configuration.set(config::DEFAULT_CONTEXT, "urn:ctx:a");
    let driver = Driver::in_memory([ctx.clone()], metamodel(), configuration);

    let mut connection = driver.connect();
    // Untracked entities save to the default context.
    assert_eq!(
        connection.save_context_for::<Course>(&key("urn:course:1")),
        Some(ctx.clone())
    );

    // A tracked entity stays bound to the context it was persisted to.
    connection
        .persist(Course::new("urn:course:1", "Rust"), Some(ctx.clone()))
        .unwrap();
    assert_eq!(
        connection.save_context_for::<Course>(&key("urn:course:1")),
        Some(ctx)
    );
}

#[test]
fn find_in_any_context_searches_named_contexts() {
    let ctx = NamedResource::new("urn:ctx:a");
    let driver = Driver::in_memory([ctx.clone()], metamodel(), DriverConfiguration::new());

    let mut writer = driver.connect();
    writer
        .persist(Course::new("urn:course:1", "Rust"), Some(ctx))
        .unwrap();
    writer.commit().unwrap();

    let mut reader = driver.connect();
    let found = reader
        .find_in_any_context::<Course>(&key("urn:course:1"))
        .unwrap();
    assert_eq!(found.map(|c| c.name.clone()), Some("Rust".to_owned()));
}

// ============================================================================
// Merge and remove
// ============================================================================

#[test]
fn merge_rewrites_changed_attributes_and_lists() {
    let driver = driver();
    let mut writer = driver.connect();
    writer
        .persist(
            Course::new("urn:course:1", "Rust").with_modules(&["urn:mod:1", "urn:mod:2"]),
            None,
        )
        .unwrap();
    writer.commit().unwrap();

    let updated =
        Course::new("urn:course:1", "Advanced Rust").with_modules(&["urn:mod:1", "urn:mod:3"]);
    writer.merge(&key("urn:course:1"), updated).unwrap();
    writer.commit().unwrap();

    let mut reader = driver.connect();
    let found = reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Advanced Rust");
    assert_eq!(found.modules, vec![key("urn:mod:1"), key("urn:mod:3")]);
}

#[test]
fn merging_an_unmanaged_entity_is_rejected() {
    let driver = driver();
    let mut connection = driver.connect();
    let result = connection.merge(&key("urn:course:1"), Course::new("urn:course:1", "Rust"));
    assert!(matches!(result, Err(OntoError::InvalidArgument(_))));
}

#[test]
fn remove_leaves_no_trace_of_the_entity_or_its_lists() {
    let driver = driver();
    let mut connection = driver.connect();
    connection
        .persist(
            Course::new("urn:course:1", "Rust").with_modules(&["urn:mod:1", "urn:mod:2"]),
            None,
        )
        .unwrap();
    connection.commit().unwrap();

    connection.remove::<Course>(&key("urn:course:1")).unwrap();
    connection.commit().unwrap();

    let mut reader = driver.connect();
    assert!(reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .is_none());
    // No axiom about the owner or the chain survives in the central store.
    let central = driver.central();
    assert!(central
        .find(Some(&key("urn:course:1")), None, None, None)
        .unwrap()
        .is_empty());
    assert!(central
        .find(Some(&key("urn:mod:1")), None, None, None)
        .unwrap()
        .is_empty());
}

// ============================================================================
// Second-level cache
// ============================================================================

#[test]
fn cache_shares_materialized_entities_across_connections() {
    let driver = driver();
    let mut writer = driver.connect();
    writer
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();
    writer.commit().unwrap();

    let mut first = driver.connect();
    let loaded = first
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();

    let mut second = driver.connect();
    let cached = second
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();
    assert!(Arc::ptr_eq(&loaded, &cached));
}

#[test]
fn commit_evicts_cache_entries_of_touched_contexts() {
    let driver = driver();
    let mut writer = driver.connect();
    writer
        .persist(Course::new("urn:course:1", "Rust"), None)
        .unwrap();
    writer.commit().unwrap();

    // Populate the cache.
    let mut reader = driver.connect();
    reader
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();

    let mut editor = driver.connect();
    editor
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();
    editor
        .merge(
            &key("urn:course:1"),
            Course::new("urn:course:1", "Advanced Rust"),
        )
        .unwrap();
    editor.commit().unwrap();

    let mut fresh = driver.connect();
    let found = fresh
        .find::<Course>(&key("urn:course:1"), &descriptor("urn:course:1"))
        .unwrap()
        .unwrap();
    assert_eq!(found.name, "Advanced Rust");
}
