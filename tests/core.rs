//! Broader testable properties of the core modules, independent of the full
//! lifecycle flow exercised in `tests/lifecycle.rs`.

use funcctl::core::cancellation::Cancellation;
use funcctl::core::client::{Client, RemoveRequest, Remover};
use funcctl::core::error::FuncError;
use funcctl::core::function::{derive_image_name, BuildType, Function};
use funcctl::core::repositories::Repositories;
use funcctl::core::templates::Templates;
use tempfile::tempdir;

#[test]
fn function_round_trips_through_yaml() {
    let dir = tempdir().unwrap();
    let f = Function {
        root: dir.path().to_path_buf(),
        name: "roundtrip".to_string(),
        runtime: "node".to_string(),
        registry: "alice".to_string(),
        created: 100,
        ..Function::default()
    };
    f.write().unwrap();
    let loaded = Function::load(dir.path()).unwrap();
    assert_eq!(loaded.name, "roundtrip");
    assert_eq!(loaded.runtime, "node");
}

#[test]
fn migration_is_idempotent_across_repeated_loads() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("func.yaml"),
        "name: stable\nruntime: go\ncreated: 5\n",
    )
    .unwrap();
    let first = Function::load(dir.path()).unwrap();
    first.write().unwrap();
    let second = Function::load(dir.path()).unwrap();
    assert_eq!(first.spec_version, second.spec_version);
    assert_eq!(first.created, second.created);
}

#[test]
fn create_twice_on_the_same_root_is_already_initialized() {
    let dir = tempdir().unwrap();
    let client = Client::builder().build();
    let cancellation = Cancellation::new();
    let cfg = |n: &str| Function {
        root: dir.path().to_path_buf(),
        name: n.to_string(),
        runtime: "go".to_string(),
        registry: "alice".to_string(),
        build_type: BuildType::Local,
        ..Function::default()
    };
    client.create(cfg("hello"), "http", &cancellation).unwrap();
    let err = client.create(cfg("hello"), "http", &cancellation).unwrap_err();
    assert!(matches!(err, FuncError::AlreadyInitialized(_)));
}

#[test]
fn built_reports_false_until_build_runs_and_true_after() {
    let dir = tempdir().unwrap();
    let client = Client::builder().build();
    let cancellation = Cancellation::new();
    let created = client
        .create(
            Function {
                root: dir.path().to_path_buf(),
                name: "hello".to_string(),
                runtime: "go".to_string(),
                registry: "alice".to_string(),
                build_type: BuildType::Local,
                ..Function::default()
            },
            "http",
            &cancellation,
        )
        .unwrap();
    assert!(!Client::built(&created.root));
    client.build(&created.root, &cancellation).unwrap();
    assert!(Client::built(&created.root));
}

#[test]
fn image_name_derivation_cases() {
    assert_eq!(derive_image_name("alice", "f").unwrap(), "docker.io/alice/f:latest");
    assert_eq!(
        derive_image_name("quay.io/alice", "f").unwrap(),
        "quay.io/alice/f:latest"
    );
    assert_eq!(
        derive_image_name("docker.io/alice/sub", "f").unwrap(),
        "docker.io/alice/sub/f:latest"
    );
    assert!(derive_image_name("docker.io/alice/sub/extra", "f").is_err());
    assert!(derive_image_name("", "f").is_err());
    assert!(derive_image_name("alice", "").is_err());
}

#[test]
fn repositories_all_always_lists_default_first() {
    let repos = Repositories::new(None);
    let all = repos.all().unwrap();
    assert_eq!(all[0].name, "default");
}

#[test]
fn templates_list_dedupes_and_orders_default_repository_first() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("mine/go/http")).unwrap();
    std::fs::write(dir.path().join("mine/go/http/handle.go"), "package function").unwrap();

    let repos = Repositories::new(Some(dir.path().to_path_buf()));
    let templates = Templates::new(&repos);
    let names = templates.list("go").unwrap();

    let http_pos = names.iter().position(|n| n == "http").unwrap();
    let mine_http_pos = names.iter().position(|n| n == "mine/http").unwrap();
    assert!(http_pos < mine_http_pos);
    assert_eq!(names.iter().filter(|n| *n == "http").count(), 1);
}

#[test]
fn invoke_on_a_non_2xx_response_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        use std::io::{Read, Write};
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n");
        }
    });

    let dir = tempdir().unwrap();
    let client = Client::builder().build();
    let cancellation = Cancellation::new();
    let created = client
        .create(
            Function {
                root: dir.path().to_path_buf(),
                name: "hello".to_string(),
                runtime: "go".to_string(),
                registry: "alice".to_string(),
                build_type: BuildType::Local,
                ..Function::default()
            },
            "http",
            &cancellation,
        )
        .unwrap();
    client.local_instances().register(funcctl::core::instances::Instance {
        name: created.name.clone(),
        route: format!("http://{addr}"),
        ..Default::default()
    });

    let message = funcctl::core::invoker::Message::default();
    let err = client
        .invoke(&created.root, &created.name, &message, &cancellation)
        .unwrap_err();
    assert!(matches!(err, FuncError::Transport { .. }));
}

#[test]
fn remove_without_a_name_on_an_uninitialized_root_errors_without_calling_remover() {
    struct PanicRemover;
    impl Remover for PanicRemover {
        fn remove(&self, _name: &str, _c: &Cancellation) -> Result<(), FuncError> {
            panic!("remover should not be called for an uninitialized root");
        }
    }
    let dir = tempdir().unwrap();
    let client = Client::builder().with_remover(PanicRemover).build();
    let cancellation = Cancellation::new();

    let req = RemoveRequest {
        name: None,
        root: Some(dir.path().to_path_buf()),
        delete_all: false,
    };
    let err = client.remove(req, &cancellation).unwrap_err();
    assert!(matches!(err, FuncError::NotInitialized(_)));
}

#[test]
fn remove_without_a_name_or_root_is_a_validation_error() {
    let client = Client::builder().build();
    let cancellation = Cancellation::new();
    let req = RemoveRequest {
        name: None,
        root: None,
        delete_all: false,
    };
    let err = client.remove(req, &cancellation).unwrap_err();
    assert!(matches!(err, FuncError::Validation(_)));
}
