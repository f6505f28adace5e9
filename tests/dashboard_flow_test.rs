mod dashboard_flow_tests {
    use std::sync::Arc;

    use leadserver::kb::store::KnowledgeBaseStore;
    use leadserver::kb::webhook::{KbProcessingPayload, WebhookClient};
    use leadserver::leads::store::LeadStore;
    use leadserver::leads::{CreateLeadData, LeadFilterPatch, LeadStatus, UpdateLeadData};
    use leadserver::profile::avatar::{AvatarStorage, AvatarUpload, FsAvatarStorage};
    use leadserver::profile::store::ProfileStore;
    use leadserver::profile::UpdateProfileData;
    use leadserver::realtime::{notification_for, ChangeEvent, ChangeKind};
    use leadserver::shared::test_utils::{
        sample_lead, test_identity, MemoryKnowledgeBaseRepository, MemoryLeadRepository,
        MemoryProfileRepository,
    };

    fn create_data(name: &str) -> CreateLeadData {
        CreateLeadData {
            full_name: name.to_string(),
            email: Some("lead@example.com".to_string()),
            phone: None,
            company: None,
            designation: None,
            inquiry_type: None,
            status: None,
            note: None,
            source: None,
        }
    }

    #[tokio::test]
    async fn lead_lifecycle_with_filters() {
        let me = test_identity();
        let repo = Arc::new(MemoryLeadRepository::default());
        let mut store = LeadStore::new(repo, me.clone());

        store.create(create_data("Sarah Connor")).await.unwrap();
        store.create(create_data("John Doe")).await.unwrap();
        assert_eq!(store.leads().len(), 2);

        let sarah_id = store
            .leads()
            .iter()
            .find(|l| l.full_name == "Sarah Connor")
            .unwrap()
            .id;

        store
            .update(
                sarah_id,
                UpdateLeadData {
                    status: Some(LeadStatus::Hot),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Narrowing to hot leads leaves only the updated row visible.
        store
            .update_filters(LeadFilterPatch {
                status: Some(Some(LeadStatus::Hot)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.leads().len(), 1);
        assert_eq!(store.leads()[0].full_name, "Sarah Connor");

        // Widening back with the "all" sentinel restores both rows.
        store
            .update_filters(LeadFilterPatch {
                status: Some(None),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(store.leads().len(), 2);

        store.delete(sarah_id).await.unwrap();
        assert_eq!(store.leads().len(), 1);
        assert_eq!(store.leads()[0].full_name, "John Doe");
    }

    #[tokio::test]
    async fn change_events_notify_owner_but_not_strangers() {
        let me = test_identity();
        let someone_else = test_identity();

        let mine = sample_lead(me.id, "Fresh Lead");
        let event = ChangeEvent::insert(mine);

        let note = notification_for(&event, &me).unwrap();
        assert_eq!(note.kind, ChangeKind::Insert);
        assert_eq!(
            note.message,
            "New lead \"Fresh Lead\" has been added successfully!"
        );
        assert!(notification_for(&event, &someone_else).is_none());
    }

    #[tokio::test]
    async fn kb_url_round_trip_reaches_the_processing_webhook() {
        let me = test_identity();
        let repo = Arc::new(MemoryKnowledgeBaseRepository::default());
        let mut store = KnowledgeBaseStore::new(repo, me.clone());

        store
            .create(
                "Pricing sheet".to_string(),
                "https://drive.example.com/pricing".to_string(),
            )
            .await
            .unwrap();
        let url = store.urls()[0].clone();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/knowledge-base")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let client = WebhookClient::new(format!("{}/webhook/knowledge-base", server.url()));
        client
            .send_for_processing(&KbProcessingPayload {
                user_id: me.id,
                username: me.email_local_part().to_string(),
                url_id: url.id,
                drive_url: url.drive_url.clone(),
                title: url.title.clone(),
            })
            .await
            .unwrap();
        mock.assert_async().await;

        store.delete(url.id).await.unwrap();
        assert!(store.urls().is_empty());
    }

    #[tokio::test]
    async fn profile_session_with_avatar_on_disk() {
        let me = test_identity();
        let dir = tempfile::tempdir().unwrap();
        let avatars: Arc<dyn AvatarStorage> = Arc::new(FsAvatarStorage::new(
            dir.path().to_path_buf(),
            "http://localhost:8080/avatars".to_string(),
        ));
        let repo = Arc::new(MemoryProfileRepository::default());
        let mut store = ProfileStore::new(repo, avatars, me.clone());

        // First touch creates the row from the identity.
        store.load().await.unwrap();
        assert_eq!(store.profile().unwrap().email.as_deref(), Some(me.email.as_str()));

        store
            .update(UpdateProfileData {
                full_name: Some("Sarah Connor".to_string()),
                bio: Some("Closing deals since 2019".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let url = store
            .upload_avatar(AvatarUpload {
                file_name: "me.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: bytes::Bytes::from_static(b"png-bytes"),
            })
            .await
            .unwrap();
        assert_eq!(store.profile().unwrap().avatar_url.as_deref(), Some(url.as_str()));

        let object = dir
            .path()
            .join(url.trim_start_matches("http://localhost:8080/avatars/"));
        assert!(object.exists());

        store.delete_avatar().await.unwrap();
        assert!(store.profile().unwrap().avatar_url.is_none());
        assert!(!object.exists());
    }

    #[tokio::test]
    async fn stores_do_not_leak_rows_across_identities() {
        let sarah = test_identity();
        let john = test_identity();
        let repo = Arc::new(MemoryLeadRepository::default());

        let mut sarahs = LeadStore::new(repo.clone(), sarah.clone());
        let mut johns = LeadStore::new(repo.clone(), john.clone());

        sarahs.create(create_data("Sarah's Lead")).await.unwrap();
        johns.load().await.unwrap();
        assert!(johns.leads().is_empty());

        // John cannot delete a row he does not own.
        let foreign = sarahs.leads()[0].id;
        assert!(johns.delete(foreign).await.is_err());
        sarahs.load().await.unwrap();
        assert_eq!(sarahs.leads().len(), 1);
    }
}
