//! Two in-memory devices syncing through the full service stack.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use canopy_sync_engine::{
    LocalRemote, PullRequest, Reconciler, RemoteAccessor, SyncService, SyncServiceConfig,
};
use sync_store::{InProcessLockStore, MemoryBacking, StoreBacking};
use sync_types::{
    Glob, Provenance, RemoteId, StorageRootId, SyncableId, ACCESS_BUNDLE_NAME,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy_sync_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn device() -> Arc<MemoryBacking> {
    // Replicas of the same store share a root id.
    Arc::new(MemoryBacking::new(StorageRootId::new("vault")))
}

fn service_on(
    local: Arc<MemoryBacking>,
    peer: Arc<MemoryBacking>,
    sweep_interval: Duration,
) -> SyncService {
    let mut remotes: BTreeMap<RemoteId, Arc<dyn RemoteAccessor>> = BTreeMap::new();
    remotes.insert(
        RemoteId::new("peer"),
        Arc::new(LocalRemote::new(peer)) as Arc<dyn RemoteAccessor>,
    );
    let reconciler = Reconciler::new(local, remotes, Arc::new(InProcessLockStore::new()));
    SyncService::new(
        Arc::new(reconciler),
        None,
        SyncServiceConfig {
            sweep_interval,
            glob: Glob::all(),
        },
    )
}

async fn write_file(backing: &MemoryBacking, folder: &str, file: &str, content: &[u8]) {
    let folder_path = backing.root().child(SyncableId::folder(folder));
    backing
        .create_folder_with_path(&folder_path, Provenance::default())
        .await
        .unwrap();
    backing
        .create_binary_file_with_path(
            &folder_path.child(SyncableId::file(file)),
            Provenance::default(),
            content.to_vec(),
        )
        .await
        .unwrap();
}

async fn root_hash(backing: &MemoryBacking) -> sync_types::ItemHash {
    backing
        .get_metadata_at_path(&backing.root())
        .await
        .unwrap()
        .hash
}

async fn settled(service: &SyncService) {
    sleep(Duration::from_millis(30)).await;
    for _ in 0..400 {
        if service.is_idle() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("service never settled");
}

#[tokio::test]
async fn fresh_device_converges_with_a_seeded_peer() {
    init_tracing();
    let laptop = device();
    let phone = device();

    write_file(&phone, "notes", "todo", b"buy milk").await;
    let bundle = phone.root().child(SyncableId::bundle(ACCESS_BUNDLE_NAME));
    phone
        .create_folder_with_path(&bundle, Provenance::default())
        .await
        .unwrap();

    let service = service_on(laptop.clone(), phone.clone(), Duration::from_secs(3600));
    service.start(2, 2);
    settled(&service).await;
    service.stop().await;

    assert_eq!(root_hash(&laptop).await, root_hash(&phone).await);
    let todo = laptop
        .root()
        .child(SyncableId::folder("notes"))
        .child(SyncableId::file("todo"));
    assert_eq!(laptop.get_at_path(&todo).await.unwrap(), b"buy milk");
}

#[tokio::test]
async fn divergent_devices_merge_both_ways() {
    init_tracing();
    let laptop = device();
    let phone = device();

    write_file(&laptop, "notes", "laptop-only", b"from laptop").await;
    write_file(&phone, "photos", "phone-only", b"from phone").await;

    let service = service_on(laptop.clone(), phone.clone(), Duration::from_secs(3600));
    service.start(2, 2);
    settled(&service).await;
    service.stop().await;

    assert_eq!(root_hash(&laptop).await, root_hash(&phone).await);
    let from_phone = laptop
        .root()
        .child(SyncableId::folder("photos"))
        .child(SyncableId::file("phone-only"));
    assert_eq!(laptop.get_at_path(&from_phone).await.unwrap(), b"from phone");
    let from_laptop = phone
        .root()
        .child(SyncableId::folder("notes"))
        .child(SyncableId::file("laptop-only"));
    assert_eq!(
        phone.get_at_path(&from_laptop).await.unwrap(),
        b"from laptop"
    );
}

#[tokio::test]
async fn syncing_twice_changes_nothing() {
    init_tracing();
    let laptop = device();
    let phone = device();
    write_file(&phone, "notes", "todo", b"buy milk").await;

    let service = service_on(laptop.clone(), phone.clone(), Duration::from_secs(3600));
    service.start(2, 2);
    settled(&service).await;

    let first = root_hash(&laptop).await;
    service.pull_from_remotes(PullRequest {
        path: laptop.root(),
        hash: None,
    });
    settled(&service).await;
    service.stop().await;

    assert_eq!(root_hash(&laptop).await, first);
    assert_eq!(root_hash(&laptop).await, root_hash(&phone).await);
}

#[tokio::test]
async fn live_edits_flow_while_the_service_runs() {
    init_tracing();
    let laptop = device();
    let phone = device();

    let service = service_on(laptop.clone(), phone.clone(), Duration::from_millis(40));
    service.start(2, 2);
    sleep(Duration::from_millis(30)).await;

    write_file(&laptop, "notes", "draft", b"v1").await;
    settled(&service).await;

    let draft = laptop
        .root()
        .child(SyncableId::folder("notes"))
        .child(SyncableId::file("draft"));
    assert_eq!(phone.get_at_path(&draft).await.unwrap(), b"v1");

    // Edit the same file and let the event-driven push carry it over.
    laptop
        .create_binary_file_with_path(&draft, Provenance::default(), b"v2".to_vec())
        .await
        .unwrap();
    settled(&service).await;
    service.stop().await;

    assert_eq!(phone.get_at_path(&draft).await.unwrap(), b"v2");
}
