//! Integration tests for loading schemas through authorities and the cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use ion_schema::authority::{Authority, ElementStream, FilesystemAuthority, InMemoryAuthority};
use ion_schema::cache::{DefaultSchemaCache, SchemaCache};
use ion_schema::{IonSchemaError, IonSchemaSystem, Schema};
use tempfile::TempDir;

const BASE: &str = r#"$ion_schema_2_0
type::{ name: positive, type: int, valid_values: range::[1, max] }
type::{ name: label, type: string }
"#;

const MIDDLE: &str = r#"$ion_schema_2_0
schema_header::{ imports: [{ id: "base.isl" }] }
type::{ name: amount, type: positive }
schema_footer::{}
"#;

/// Counts lookups and slows them down so concurrent callers overlap.
struct CountingAuthority {
    inner: InMemoryAuthority,
    calls: AtomicUsize,
}

impl CountingAuthority {
    fn new(inner: InMemoryAuthority) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Authority for CountingAuthority {
    fn elements(&self, id: &str) -> Result<ElementStream, IonSchemaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        self.inner.elements(id)
    }
}

fn in_memory(schemas: &[(&str, &str)]) -> InMemoryAuthority {
    schemas
        .iter()
        .fold(InMemoryAuthority::new(), |a, (id, text)| a.with_text(*id, *text))
}

mod cache_concurrency {
    use super::*;

    #[test]
    fn one_build_for_many_callers() {
        const THREADS: usize = 8;
        let authority = Arc::new(CountingAuthority::new(in_memory(&[("base.isl", BASE)])));
        let system = Arc::new(
            IonSchemaSystem::builder()
                .with_authorities(vec![authority.clone() as Arc<dyn Authority>])
                .build(),
        );
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let system = Arc::clone(&system);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    system.load_schema("base.isl").unwrap()
                })
            })
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(authority.calls.load(Ordering::SeqCst), 1);
        assert!(schemas.iter().all(|s| Arc::ptr_eq(s, &schemas[0])));
    }

    #[test]
    fn loading_both_ends_of_a_cycle_at_once() {
        const A: &str = r#"$ion_schema_2_0
        schema_header::{ imports: [{ id: "b.isl", type: y }] }
        type::{ name: x, type: int }
        schema_footer::{}
        "#;
        const B: &str = r#"$ion_schema_2_0
        schema_header::{ imports: [{ id: "a.isl", type: x }] }
        type::{ name: y, type: list, element: x }
        schema_footer::{}
        "#;
        let authority = CountingAuthority::new(in_memory(&[("a.isl", A), ("b.isl", B)]));
        let system = Arc::new(IonSchemaSystem::builder().with_authority(authority).build());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["a.isl", "b.isl"]
            .into_iter()
            .map(|id| {
                let system = Arc::clone(&system);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    system.load_schema(id).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(system.load_schema("a.isl").unwrap().type_origin("y"), Some("b.isl"));
        assert_eq!(system.load_schema("b.isl").unwrap().type_origin("x"), Some("a.isl"));
    }

    #[test]
    fn invalidate_forces_a_reload() {
        let authority = Arc::new(CountingAuthority::new(in_memory(&[("base.isl", BASE)])));
        let system = IonSchemaSystem::builder()
            .with_authorities(vec![authority.clone() as Arc<dyn Authority>])
            .build();

        system.load_schema("base.isl").unwrap();
        system.load_schema("base.isl").unwrap();
        assert_eq!(authority.calls.load(Ordering::SeqCst), 1);

        system.invalidate("base.isl");
        system.load_schema("base.isl").unwrap();
        assert_eq!(authority.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn custom_cache_is_used() {
        let cache = Arc::new(DefaultSchemaCache::<Schema>::new());
        let system = IonSchemaSystem::builder()
            .with_authority(in_memory(&[("base.isl", BASE), ("middle.isl", MIDDLE)]))
            .with_schema_cache(cache.clone())
            .build();

        system.load_schema("middle.isl").unwrap();
        // Imports are cached too.
        assert!(cache.get("base.isl").is_some());
        assert!(SchemaCache::get(cache.as_ref(), "middle.isl").is_some());
    }
}

mod import_strictness {
    use super::*;

    const CLIENT: &str = r#"$ion_schema_2_0
    schema_header::{ imports: [{ id: "middle.isl", type: positive }] }
    type::{ name: quantity, type: positive }
    schema_footer::{}
    "#;

    const WILDCARD_CLIENT: &str = r#"$ion_schema_2_0
    schema_header::{ imports: [{ id: "middle.isl" }] }
    type::{ name: quantity, type: label }
    schema_footer::{}
    "#;

    fn system(allow: bool) -> IonSchemaSystem {
        IonSchemaSystem::builder()
            .with_authority(in_memory(&[
                ("base.isl", BASE),
                ("middle.isl", MIDDLE),
                ("client.isl", CLIENT),
                ("wildcard.isl", WILDCARD_CLIENT),
            ]))
            .allow_transitive_imports(allow)
            .build()
    }

    #[test]
    fn transitive_type_import_is_rejected_by_default() {
        let err = system(false).load_schema("client.isl").unwrap_err();
        match err {
            IonSchemaError::TransitiveImport {
                schema_id,
                type_name,
            } => {
                assert_eq!(schema_id, "middle.isl");
                assert_eq!(type_name, "positive");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn transitive_type_import_is_allowed_when_enabled() {
        let schema = system(true).load_schema("client.isl").unwrap();
        assert!(schema.resolve_type("positive").is_some());
    }

    #[test]
    fn wildcard_reference_through_another_wildcard() {
        let err = system(false).load_schema("wildcard.isl").unwrap_err();
        assert!(matches!(err, IonSchemaError::TransitiveImport { .. }));
        assert!(system(true).load_schema("wildcard.isl").is_ok());
    }

    #[test]
    fn direct_imports_are_fine() {
        let schema = system(false).load_schema("middle.isl").unwrap();
        assert!(schema.get_type("amount").is_some());
        let import = schema.get_import("base.isl").unwrap();
        assert!(import.is_wildcard());
    }

    #[test]
    fn failed_imports_name_the_schema() {
        let system = IonSchemaSystem::builder()
            .with_authority(in_memory(&[("middle.isl", MIDDLE)]))
            .build();
        let err = system.load_schema("middle.isl").unwrap_err();
        match err {
            IonSchemaError::ImportFailed { id, source } => {
                assert_eq!(id, "base.isl");
                assert!(matches!(*source, IonSchemaError::SchemaNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

mod authorities {
    use super::*;
    use std::fs;

    #[test]
    fn first_non_empty_authority_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.isl"),
            "$ion_schema_2_0 type::{ name: from_disk }",
        )
        .unwrap();
        fs::write(dir.path().join("other.isl"), "$ion_schema_2_0 type::{ name: other }").unwrap();

        let system = IonSchemaSystem::builder()
            .add_authority(in_memory(&[("base.isl", BASE)]))
            .add_authority(FilesystemAuthority::new(dir.path()).unwrap())
            .build();

        let base = system.load_schema("base.isl").unwrap();
        assert!(base.get_type("positive").is_some());
        assert!(base.get_type("from_disk").is_none());

        let other = system.load_schema("other.isl").unwrap();
        assert!(other.get_type("other").is_some());
    }

    #[test]
    fn filesystem_imports_use_relative_ids() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/base.isl"), BASE).unwrap();
        fs::write(
            dir.path().join("app.isl"),
            r#"$ion_schema_2_0
            schema_header::{ imports: [{ id: "lib/base.isl", type: label, as: name }] }
            type::{ name: person, fields: { name: name } }
            schema_footer::{}"#,
        )
        .unwrap();

        let system = IonSchemaSystem::builder()
            .with_authority(FilesystemAuthority::new(dir.path()).unwrap())
            .build();
        let app = system.load_schema("app.isl").unwrap();
        assert!(app.resolve_type("name").is_some());
        assert!(app.resolve_type("label").is_none());
    }

    #[test]
    fn denied_ids_are_reported_as_causes() {
        let dir = TempDir::new().unwrap();
        let system = IonSchemaSystem::builder()
            .with_authority(FilesystemAuthority::new(dir.path()).unwrap())
            .build();
        let err = system.load_schema("../escape.isl").unwrap_err();
        match err {
            IonSchemaError::SchemaNotFound { causes, .. } => {
                assert_eq!(causes.len(), 1);
                assert!(causes[0].contains("access denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn new_schema_resolves_against_authorities() {
        let system = IonSchemaSystem::builder()
            .with_authority(in_memory(&[("base.isl", BASE)]))
            .build();
        let schema = system
            .new_schema(
                r#"$ion_schema_2_0
                schema_header::{ imports: [{ id: "base.isl", type: positive }] }
                type::{ name: count, type: positive }
                schema_footer::{}"#,
            )
            .unwrap();
        assert_eq!(schema.id(), None);
        assert!(schema.get_type("count").is_some());
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;
    use ion_schema::authority::HttpAuthority;

    #[test]
    fn loads_over_http() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/schemas/base.isl")
            .with_status(200)
            .with_body(BASE)
            .create();

        let authority = HttpAuthority::new(format!("{}/schemas", server.url())).unwrap();
        let system = IonSchemaSystem::builder().with_authority(authority).build();
        let schema = system.load_schema("base.isl").unwrap();
        assert!(schema.get_type("label").is_some());
        mock.assert();
    }

    #[test]
    fn not_found_falls_through_to_next_authority() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/base.isl")
            .with_status(404)
            .create();

        let system = IonSchemaSystem::builder()
            .add_authority(HttpAuthority::new(server.url()).unwrap())
            .add_authority(in_memory(&[("base.isl", BASE)]))
            .build();
        assert!(system.load_schema("base.isl").is_ok());
        mock.assert();
    }

    #[test]
    fn server_errors_are_causes() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/base.isl")
            .with_status(500)
            .create();

        let system = IonSchemaSystem::builder()
            .with_authority(HttpAuthority::new(server.url()).unwrap())
            .build();
        let err = system.load_schema("base.isl").unwrap_err();
        match err {
            IonSchemaError::SchemaNotFound { causes, .. } => {
                assert!(causes[0].contains("failed to fetch"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
