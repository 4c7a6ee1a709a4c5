//! End-to-end behaviour of the reveal coordinator on simulated pages.

use anyhow::{Error, Result, anyhow};
use futures::FutureExt as _;
use html::NodeKey;
use page_handler::fonts::{FaceStatus, FontKey, FontStyle};
use page_handler::resources::ReadyState;
use page_handler::{HtmlPage, RevealConfig};
use reveal::{
    Dependency, DispatchOutcome, DispatchReport, JoinSet, ResourceError, SETUP_PRIORITY, dispatch,
    install, is_running,
};
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::{self, LocalSet};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn page_from(source: &str) -> Result<Rc<HtmlPage>> {
    let config = RevealConfig::default().with_frame_budget_ms(0);
    let page = HtmlPage::parse(config, source)?;
    page.apply_stack_layout();
    Ok(page)
}

fn by_id(page: &HtmlPage, id: &str) -> Result<NodeKey> {
    let dom = page.dom();
    let found = dom
        .descendants(dom.root())
        .find(|node| dom.attr(*node, "id") == Some(id));
    found.ok_or_else(|| anyhow!("no element with id {id}"))
}

fn running(page: &HtmlPage, id: &str) -> Result<bool> {
    let key = by_id(page, id)?;
    Ok(is_running(&page.dom(), key))
}

async fn turns(page: &HtmlPage, count: usize) {
    for _ in 0..count {
        page.turn().await;
    }
}

fn drain(reports: &mut UnboundedReceiver<DispatchReport>) -> Vec<DispatchReport> {
    let mut out = Vec::new();
    while let Ok(report) = reports.try_recv() {
        out.push(report);
    }
    out
}

#[tokio::test]
async fn loaded_image_and_poster_video_resolve_without_listeners() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="a" class="animated">
                    <img id="photo" src="a.png"><video id="clip" poster="poster.jpg"></video>
                </div>"#,
            )?;
            let container = by_id(&page, "a")?;
            let photo = by_id(&page, "photo")?;
            page.resources().borrow_mut().complete_image(photo);

            let joins = JoinSet::collect(&page, container);
            assert_eq!(joins.len(), 2);
            assert_eq!(joins.join().now_or_never(), Some(Ok(())));
            assert_eq!(page.resources().borrow().listener_registrations(), 0);

            let task = task::spawn_local(dispatch(Rc::clone(&page), container));
            page.turn().await;
            let outcome = task.await?;
            assert!(matches!(outcome, DispatchOutcome::Started { target, .. } if target == container));
            assert!(running(&page, "a")?);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn failing_image_keeps_container_still() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<section id="b" class="animate-on-scroll animated">
                    <img id="broken" src="missing.png" loading="lazy">
                </section>"#,
            )?;
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 2).await;

            let broken = by_id(&page, "broken")?;
            assert_eq!(page.dom().attr(broken, "loading"), Some("eager"));
            assert!(drain(&mut reports).is_empty());

            assert_eq!(page.resources().borrow_mut().fail_image(broken), 1);
            turns(&page, 2).await;

            let container = by_id(&page, "b")?;
            assert_eq!(
                drain(&mut reports),
                vec![DispatchReport {
                    container,
                    outcome: DispatchOutcome::Failed {
                        target: container,
                        error: ResourceError::Failed(Dependency::Image(broken)),
                    },
                }]
            );
            assert!(!running(&page, "b")?);
            assert_eq!(page.pending_frames(), 0);

            // A late successful load does not revive it.
            page.resources().borrow_mut().complete_image(broken);
            turns(&page, 2).await;
            assert!(!running(&page, "b")?);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn untagged_container_delegates_to_first_child() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="c" class="animate-on-scroll"><!-- note -->
                    <div id="d" class="animated"></div><div id="e" class="animated"></div>
                </div>"#,
            )?;
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 1).await;

            let report = reports.recv().await.ok_or_else(|| anyhow!("no report"))?;
            assert_eq!(report.container, by_id(&page, "c")?);
            assert_eq!(report.outcome.target(), Some(by_id(&page, "d")?));
            assert!(report.outcome.is_started());
            assert!(running(&page, "d")?);
            assert!(!running(&page, "c")?);
            assert!(!running(&page, "e")?);
            assert_eq!(page.resources().borrow().listener_registrations(), 0);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn container_without_animation_or_children_is_skipped() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(r#"<div id="plain" class="animate-on-scroll" data-height="50"></div>"#)?;
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 1).await;

            let report = reports.recv().await.ok_or_else(|| anyhow!("no report"))?;
            assert_eq!(report.outcome, DispatchOutcome::Skipped);
            assert_eq!(page.pending_frames(), 0);
            assert_eq!(page.resources().borrow().listener_registrations(), 0);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn no_containers_means_no_observer() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(r#"<p class="animated">Hello</p>"#)?;
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 1).await;

            assert_eq!(page.intersections().borrow().observer_count(), 0);
            assert!(reports.recv().await.is_none());
            assert_eq!(page.frame_count(), 1);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn containers_trigger_once_across_reentry() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<section id="top" class="animate-on-scroll" data-height="100"><div class="animated"></div></section>
                <div data-height="3000"></div>
                <section id="bottom" class="animate-on-scroll" data-height="100"><div class="animated"></div></section>"#,
            )?;
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 1).await;
            for scroll in [3000.0, 0.0, 3000.0, 0.0] {
                page.scroll_to(0.0, scroll);
                turns(&page, 1).await;
            }

            let containers: Vec<NodeKey> = drain(&mut reports)
                .into_iter()
                .map(|report| report.container)
                .collect();
            assert_eq!(containers, vec![by_id(&page, "top")?, by_id(&page, "bottom")?]);
            assert_eq!(page.intersections().borrow().observer_count(), 0);
            assert!(reports.recv().await.is_none());
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn join_waits_for_every_dependency() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<figure id="gallery" class="animate-on-scroll animated">
                    <img id="one" src="1.png"><img id="two" src="2.png"><video id="clip"></video>
                </figure>"#,
            )?;
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 1).await;
            assert_eq!(page.resources().borrow().pending_listeners(), 3);

            page.resources().borrow_mut().complete_image(by_id(&page, "two")?);
            page.resources()
                .borrow_mut()
                .set_video_ready_state(by_id(&page, "clip")?, ReadyState::HaveEnoughData);
            turns(&page, 2).await;
            assert!(!running(&page, "gallery")?);
            assert!(drain(&mut reports).is_empty());

            page.resources().borrow_mut().complete_image(by_id(&page, "one")?);
            turns(&page, 2).await;
            assert!(running(&page, "gallery")?);
            let reported = drain(&mut reports);
            assert_eq!(reported.len(), 1);
            assert!(reported[0].outcome.is_started());
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn text_waits_for_its_font_face() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="hero" class="animate-on-scroll animated" style="font-family: Inter">
                    <h1 id="title">Welcome</h1><p>Body copy</p>
                </div>"#,
            )?;
            let heading = FontKey::new("Inter", FontStyle::Normal, 700);
            let body = FontKey::new("Inter", FontStyle::Normal, 400);
            {
                let mut fonts = page.fonts().borrow_mut();
                fonts.add_face(heading.clone());
                fonts.add_face(body.clone());
                fonts.request_load(&heading)?;
                fonts.request_load(&body)?;
            }
            let container = by_id(&page, "hero")?;
            let joins = JoinSet::collect(&page, container);
            assert_eq!(
                joins.dependencies(),
                [Dependency::Font(heading.clone()), Dependency::Font(body.clone())]
            );
            drop(joins);

            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 1).await;
            page.fonts().borrow_mut().set_status(&body, FaceStatus::Loaded)?;
            turns(&page, 2).await;
            assert!(!running(&page, "hero")?);

            page.fonts().borrow_mut().set_status(&heading, FaceStatus::Loaded)?;
            turns(&page, 2).await;
            assert!(running(&page, "hero")?);
            assert_eq!(drain(&mut reports).len(), 1);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn font_face_error_blocks_but_unknown_faces_only_wait_for_ready() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="broken" class="animate-on-scroll animated" style="font-family: Lobster">Oops</div>
                <div id="fallback" class="animate-on-scroll animated">Plain serif text</div>"#,
            )?;
            let lobster = FontKey::new("Lobster", FontStyle::Normal, 400);
            {
                let mut fonts = page.fonts().borrow_mut();
                fonts.add_face(lobster.clone());
                fonts.request_load(&lobster)?;
            }
            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 2).await;
            assert!(!running(&page, "fallback")?);

            page.fonts().borrow_mut().set_status(&lobster, FaceStatus::Error)?;
            turns(&page, 2).await;
            assert!(!running(&page, "broken")?);
            assert!(running(&page, "fallback")?);

            let failed = drain(&mut reports)
                .into_iter()
                .find(|report| matches!(report.outcome, DispatchOutcome::Failed { .. }))
                .ok_or_else(|| anyhow!("no failure reported"))?;
            assert_eq!(
                failed.outcome,
                DispatchOutcome::Failed {
                    target: by_id(&page, "broken")?,
                    error: ResourceError::Failed(Dependency::Font(lobster)),
                }
            );
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn running_element_is_not_started_twice() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="spin" class="animated" style="animation-play-state: running"></div>"#,
            )?;
            let container = by_id(&page, "spin")?;
            let outcome = dispatch(Rc::clone(&page), container).await;
            assert_eq!(outcome, DispatchOutcome::AlreadyRunning { target: container });
            assert_eq!(page.pending_frames(), 0);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn setup_waits_for_the_startup_gate() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(r#"<div id="late" class="animate-on-scroll animated"></div>"#)?;
            let _reports = install(&page, SETUP_PRIORITY);
            turns(&page, 1).await;
            assert_eq!(page.intersections().borrow().observer_count(), 0);
            assert_eq!(page.startup().queued(), 1);

            page.finish_parsing();
            assert_eq!(page.intersections().borrow().observer_count(), 1);
            turns(&page, 1).await;
            assert!(running(&page, "late")?);
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn media_that_already_failed_rejects_without_listening() -> Result<()> {
    init_logger();
    let page = page_from(
        r#"<div id="f" class="animated"><img id="pic" src="x.png"><video id="vid" src="x.mp4"></video></div>"#,
    )?;
    let container = by_id(&page, "f")?;
    let pic = by_id(&page, "pic")?;
    let vid = by_id(&page, "vid")?;
    page.resources().borrow_mut().fail_video(vid);
    page.resources().borrow_mut().complete_image(pic);

    let joins = JoinSet::collect(&page, container);
    assert_eq!(
        joins.join().now_or_never(),
        Some(Err(ResourceError::Failed(Dependency::Video(vid))))
    );
    assert_eq!(page.resources().borrow().listener_registrations(), 0);
    Ok(())
}

#[tokio::test]
async fn video_with_current_data_resolves_without_listeners() -> Result<()> {
    init_logger();
    let page = page_from(
        r#"<div id="v" class="animated"><video id="clip" src="clip.mp4"></video></div>"#,
    )?;
    let container = by_id(&page, "v")?;
    let clip = by_id(&page, "clip")?;
    page.resources()
        .borrow_mut()
        .set_video_ready_state(clip, ReadyState::HaveCurrentData);

    let joins = JoinSet::collect(&page, container);
    assert_eq!(joins.dependencies(), [Dependency::Video(clip)]);
    assert_eq!(joins.join().now_or_never(), Some(Ok(())));
    assert_eq!(page.resources().borrow().listener_registrations(), 0);
    Ok(())
}

#[tokio::test]
async fn starting_keeps_the_rest_of_the_inline_style() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="bg" class="animated" style="background: url(data:image/png;base64,AAAA); opacity: 0"></div>"#,
            )?;
            let container = by_id(&page, "bg")?;
            let task = task::spawn_local(dispatch(Rc::clone(&page), container));
            page.turn().await;
            assert!(task.await?.is_started());
            assert_eq!(
                page.dom().attr(container, "style"),
                Some(
                    "background: url(data:image/png;base64,AAAA); opacity: 0; animation-play-state: running;"
                )
            );
            assert_eq!(
                page.dom().inline_style(container, "opacity").as_deref(),
                Some("0")
            );
            Ok::<(), Error>(())
        })
        .await
}

#[tokio::test]
async fn unloaded_font_face_is_asked_to_load() -> Result<()> {
    init_logger();
    LocalSet::new()
        .run_until(async {
            let page = page_from(
                r#"<div id="copy" class="animate-on-scroll animated" style="font-family: Inter">Hello</div>"#,
            )?;
            let inter = FontKey::new("Inter", FontStyle::Normal, 400);
            page.fonts().borrow_mut().add_face(inter.clone());

            let mut reports = install(&page, SETUP_PRIORITY);
            page.finish_parsing();
            turns(&page, 2).await;
            assert_eq!(page.fonts().borrow().status(&inter), Some(FaceStatus::Loading));
            assert!(!running(&page, "copy")?);

            page.fonts().borrow_mut().set_status(&inter, FaceStatus::Loaded)?;
            turns(&page, 2).await;
            assert!(running(&page, "copy")?);
            assert_eq!(drain(&mut reports).len(), 1);
            Ok::<(), Error>(())
        })
        .await
}
