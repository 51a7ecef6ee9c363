use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tether_core::config::CoreConfig;
use tether_core::scm::{MainThreadScm, COMMENTS_GROUP_HANDLE};
use tether_core::{
    Error, GroupFeatures, GroupHandle, GroupSplices, Range, RawResourceState, RawSplice,
    ResourceHandle, Revision, ScmMessage, SourceControlFeatures, SourceControlHandle, Thread,
};
use tether_host_api::{CommandOptions, ExtHostScm, HostResult};
use tether_hosts::MemoryComments;
use tokio::sync::mpsc;

#[derive(Default)]
struct RecordingHost {
    inputs: Mutex<Vec<(SourceControlHandle, String)>>,
}

#[async_trait]
impl ExtHostScm for RecordingHost {
    async fn execute_command(
        &self,
        _source_control: SourceControlHandle,
        args: Vec<String>,
        _options: CommandOptions,
    ) -> HostResult<String> {
        Ok(args.join(" "))
    }

    async fn provide_original_resource(
        &self,
        _source_control: SourceControlHandle,
        _uri: String,
    ) -> HostResult<Option<String>> {
        Ok(None)
    }

    fn input_box_value_changed(&self, source_control: SourceControlHandle, value: &str) {
        self.inputs
            .lock()
            .expect("inputs lock")
            .push((source_control, value.to_owned()));
    }
}

struct Fixture {
    host: Arc<RecordingHost>,
    comments: Arc<MemoryComments>,
    bridge: MainThreadScm,
}

fn fixture() -> Fixture {
    let host = Arc::new(RecordingHost::default());
    let comments = Arc::new(MemoryComments::new());
    let bridge = MainThreadScm::new(CoreConfig::default(), host.clone(), comments.clone());
    Fixture {
        host,
        comments,
        bridge,
    }
}

const SC: SourceControlHandle = SourceControlHandle(7);

fn register(bridge: &mut MainThreadScm, handle: SourceControlHandle, context: &str) {
    bridge
        .dispatch(ScmMessage::RegisterSourceControl {
            handle,
            id: context.into(),
            label: context.into(),
            root_uri: Some("file:///work/repo".into()),
        })
        .expect("register source control");
}

fn register_group(bridge: &mut MainThreadScm, group: i64, id: &str) {
    bridge
        .dispatch(ScmMessage::RegisterGroup {
            source_control: SC,
            group: GroupHandle(group),
            id: id.into(),
            label: id.into(),
        })
        .expect("register group");
}

fn state(handle: u32, path: &str) -> RawResourceState {
    RawResourceState(
        ResourceHandle(handle),
        format!("file:///work/repo/{path}"),
        vec!["icon-light".into(), "icon-dark".into()],
        "Modified".into(),
        false,
        false,
        Some("gitDecoration.modifiedResourceForeground".into()),
    )
}

fn group_ids(bridge: &MainThreadScm) -> Vec<String> {
    bridge
        .provider(SC)
        .map(|provider| {
            provider
                .groups()
                .iter()
                .map(|group| group.id().to_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn uris(bridge: &MainThreadScm, group: GroupHandle) -> Vec<String> {
    bridge
        .provider(SC)
        .and_then(|provider| provider.group(group))
        .map(|group| {
            group
                .resources()
                .iter()
                .map(|resource| resource.source_uri.clone())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn registration_derives_provider_id_and_context() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");

    let provider = fx.bridge.provider(SC).expect("provider");
    assert_eq!(provider.id(), "scm7");
    assert_eq!(provider.context_value(), "git");
    assert_eq!(provider.root_uri(), Some("file:///work/repo"));
    assert!(provider.groups().is_empty());
}

#[test]
fn duplicate_handle_is_a_hard_error() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");
    register_group(&mut fx.bridge, 0, "index");

    let err = fx
        .bridge
        .dispatch(ScmMessage::RegisterSourceControl {
            handle: SC,
            id: "git".into(),
            label: "again".into(),
            root_uri: None,
        })
        .expect_err("duplicate");

    assert!(matches!(err, Error::DuplicateProvider { .. }));
    assert_eq!(fx.bridge.service().len(), 1);
    assert_eq!(group_ids(&fx.bridge), vec!["index"]);
}

#[test]
fn unknown_handles_are_silently_ignored() {
    let mut fx = fixture();
    let ghost = SourceControlHandle(99);
    let messages = vec![
        ScmMessage::UpdateSourceControl {
            handle: ghost,
            features: SourceControlFeatures::default(),
        },
        ScmMessage::RegisterGroup {
            source_control: ghost,
            group: GroupHandle(0),
            id: "index".into(),
            label: "Staged".into(),
        },
        ScmMessage::SpliceResourceStates {
            source_control: ghost,
            splices: vec![GroupSplices(
                GroupHandle(0),
                vec![RawSplice(0, 0, vec![state(1, "a")])],
            )],
        },
        ScmMessage::SetInputBoxValue {
            source_control: ghost,
            value: "x".into(),
        },
        ScmMessage::UnregisterGroup {
            source_control: ghost,
            group: GroupHandle(0),
        },
        ScmMessage::UnregisterSourceControl { handle: ghost },
    ];

    for message in messages {
        fx.bridge.dispatch(message).expect("tolerated");
    }
    assert!(fx.bridge.service().is_empty());
    assert!(fx.host.inputs.lock().expect("inputs lock").is_empty());
}

#[test]
fn splices_and_features_flow_to_the_provider() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");
    register_group(&mut fx.bridge, 0, "index");
    register_group(&mut fx.bridge, 1, "workingTree");

    fx.bridge
        .dispatch(ScmMessage::SpliceResourceStates {
            source_control: SC,
            splices: vec![
                GroupSplices(
                    GroupHandle(1),
                    vec![RawSplice(0, 0, vec![state(1, "a.rs"), state(2, "b.rs")])],
                ),
                GroupSplices(GroupHandle(0), vec![RawSplice(0, 0, vec![state(3, "c.rs")])]),
            ],
        })
        .expect("splice");
    fx.bridge
        .dispatch(ScmMessage::UpdateGroupLabel {
            source_control: SC,
            group: GroupHandle(0),
            label: "Staged Changes".into(),
        })
        .expect("label");
    fx.bridge
        .dispatch(ScmMessage::UpdateSourceControl {
            handle: SC,
            features: SourceControlFeatures {
                count: Some(3),
                ..SourceControlFeatures::default()
            },
        })
        .expect("features");

    let provider = fx.bridge.provider(SC).expect("provider");
    assert_eq!(provider.features().count, Some(3));
    assert_eq!(provider.group(GroupHandle(0)).expect("index").label(), "Staged Changes");
    assert_eq!(
        uris(&fx.bridge, GroupHandle(1)),
        vec!["file:///work/repo/a.rs", "file:///work/repo/b.rs"]
    );
    let resource = &provider.group(GroupHandle(0)).expect("index").resources().as_slice()[0];
    assert_eq!(resource.decorations.icon_dark.as_deref(), Some("icon-dark"));
}

#[test]
fn splice_stops_at_unknown_group() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");
    register_group(&mut fx.bridge, 0, "index");
    register_group(&mut fx.bridge, 1, "workingTree");

    fx.bridge
        .dispatch(ScmMessage::SpliceResourceStates {
            source_control: SC,
            splices: vec![
                GroupSplices(GroupHandle(0), vec![RawSplice(0, 0, vec![state(1, "a.rs")])]),
                GroupSplices(GroupHandle(5), vec![RawSplice(0, 0, vec![state(2, "b.rs")])]),
                GroupSplices(GroupHandle(1), vec![RawSplice(0, 0, vec![state(3, "c.rs")])]),
            ],
        })
        .expect("desync is logged, not returned");

    assert_eq!(uris(&fx.bridge, GroupHandle(0)), vec!["file:///work/repo/a.rs"]);
    assert!(uris(&fx.bridge, GroupHandle(1)).is_empty());
}

#[test]
fn hidden_groups_drop_out_of_visible_resources() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");
    register_group(&mut fx.bridge, 0, "index");
    register_group(&mut fx.bridge, 1, "workingTree");
    fx.bridge
        .dispatch(ScmMessage::UpdateGroup {
            source_control: SC,
            group: GroupHandle(0),
            features: GroupFeatures {
                hide_when_empty: Some(true),
            },
        })
        .expect("update group");

    let visible: Vec<String> = fx
        .bridge
        .provider(SC)
        .expect("provider")
        .resources()
        .iter()
        .map(|group| group.id().to_owned())
        .collect();
    assert_eq!(visible, vec!["workingTree"]);
}

#[test]
fn input_changes_echo_to_host_until_unregistered() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");

    for value in ["first", "first", "second"] {
        fx.bridge
            .dispatch(ScmMessage::SetInputBoxValue {
                source_control: SC,
                value: value.into(),
            })
            .expect("set input");
    }
    assert_eq!(
        fx.bridge.repository(SC).expect("repository").input().value(),
        "second"
    );

    fx.bridge
        .dispatch(ScmMessage::UnregisterSourceControl { handle: SC })
        .expect("unregister");
    fx.bridge
        .dispatch(ScmMessage::SetInputBoxValue {
            source_control: SC,
            value: "late".into(),
        })
        .expect("tolerated");

    assert_eq!(
        *fx.host.inputs.lock().expect("inputs lock"),
        vec![(SC, "first".to_owned()), (SC, "second".to_owned())]
    );
    assert!(fx.bridge.provider(SC).is_none());
}

#[test]
fn comparison_context_gets_discussions_group_last() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "comparison");
    register_group(&mut fx.bridge, 0, "index");
    register_group(&mut fx.bridge, 1, "workingTree");

    assert_eq!(group_ids(&fx.bridge), vec!["index", "workingTree", "discussions"]);

    let err = fx.bridge.dispatch(ScmMessage::RegisterGroup {
        source_control: SC,
        group: COMMENTS_GROUP_HANDLE,
        id: "spoof".into(),
        label: "spoof".into(),
    });
    assert!(err.is_ok(), "group errors are logged, not returned");
    assert_eq!(group_ids(&fx.bridge), vec!["index", "workingTree", "discussions"]);
}

#[test]
fn plain_context_has_no_discussions_group() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");
    register_group(&mut fx.bridge, 0, "index");

    assert_eq!(group_ids(&fx.bridge), vec!["index"]);
}

fn thread(id: &str, file: &str) -> Thread {
    Thread {
        id: id.into(),
        file: file.into(),
        title: format!("Thread {id}"),
        archived: false,
        range: Range::lines(1, 0, 1, 4),
        revision: None,
        comments: Vec::new(),
    }
}

fn switch_branch(bridge: &mut MainThreadScm, branch: &str) {
    bridge
        .dispatch(ScmMessage::UpdateSourceControl {
            handle: SC,
            features: SourceControlFeatures {
                revision: Some(Revision::branch(branch, None)),
                ..SourceControlFeatures::default()
            },
        })
        .expect("update features");
}

#[test]
fn thread_changes_render_after_draining_signals() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "comparison");
    switch_branch(&mut fx.bridge, "feature");
    assert!(uris(&fx.bridge, COMMENTS_GROUP_HANDLE).is_empty());

    fx.comments
        .set_threads("file:///work/repo", "feature", vec![thread("1", "src/main.rs")]);
    assert!(uris(&fx.bridge, COMMENTS_GROUP_HANDLE).is_empty());

    assert!(fx.bridge.drain_signals() >= 1);
    assert_eq!(
        uris(&fx.bridge, COMMENTS_GROUP_HANDLE),
        vec!["file:///work/repo/src/main.rs"]
    );
}

#[test]
fn superseded_branch_cannot_overwrite_discussions() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "comparison");
    switch_branch(&mut fx.bridge, "old");
    switch_branch(&mut fx.bridge, "new");
    fx.comments
        .set_threads("file:///work/repo", "new", vec![thread("n", "new.rs")]);
    fx.bridge.drain_signals();

    fx.comments
        .set_threads("file:///work/repo", "old", vec![thread("o", "old.rs")]);
    fx.bridge.drain_signals();

    assert_eq!(
        uris(&fx.bridge, COMMENTS_GROUP_HANDLE),
        vec!["file:///work/repo/new.rs"]
    );
}

#[tokio::test]
async fn run_applies_messages_until_the_channel_closes() {
    let mut fx = fixture();
    let (tx, rx) = mpsc::unbounded_channel();
    tx.send(ScmMessage::RegisterSourceControl {
        handle: SC,
        id: "git".into(),
        label: "Git".into(),
        root_uri: None,
    })
    .expect("send");
    tx.send(ScmMessage::RegisterGroup {
        source_control: SC,
        group: GroupHandle(0),
        id: "index".into(),
        label: "Staged".into(),
    })
    .expect("send");
    drop(tx);

    fx.bridge.run(rx).await;

    assert_eq!(group_ids(&fx.bridge), vec!["index"]);
}

#[tokio::test]
async fn commands_route_through_the_host() {
    let mut fx = fixture();
    register(&mut fx.bridge, SC, "git");

    let output = fx
        .bridge
        .provider(SC)
        .expect("provider")
        .execute_command(vec!["rev-parse".into(), "HEAD".into()], CommandOptions::default())
        .await
        .expect("command");

    assert_eq!(output, "rev-parse HEAD");
}
