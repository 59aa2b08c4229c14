//! Ephemeral `--version` probe containers

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{ContainerSpec, RemoveOptions};
use crate::runtime::RuntimeClient;

use super::manager::ContainerManager;

/// Ways a probe reference can name an image, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageLookup {
    /// Reference is a container; use the image it runs
    Container,
    /// Reference is an image id or name
    Image,
}

const LOOKUP_ORDER: [ImageLookup; 2] = [ImageLookup::Container, ImageLookup::Image];

impl ImageLookup {
    async fn resolve<C: RuntimeClient>(self, client: &C, reference: &str) -> Result<String> {
        match self {
            ImageLookup::Container => client
                .inspect_container(reference)
                .await
                .map(|info| info.image),
            ImageLookup::Image => client.inspect_image(reference).await,
        }
    }
}

impl<C: RuntimeClient> ContainerManager<C> {
    /// Run `<image> --version` in a throwaway container and return its output.
    ///
    /// `reference` may name a container (its image is probed) or an image.
    /// The probe runs without networking and is force-removed after its
    /// output is collected, whether or not collection succeeded. There is
    /// no timeout: a probe that never exits blocks the caller.
    pub async fn ask_version(&self, reference: &str) -> Result<Vec<u8>> {
        let image = self.resolve_probe_image(reference).await?;

        let spec = ContainerSpec::builder(image.as_str())
            .env(self.probe_env.as_str())
            .cmd(["--version"])
            .network_mode("none")
            .auto_remove(true)
            .build();
        let host = spec.host_settings();

        let handle = self.client.create_container(&spec, &host).await?;
        self.client.start_container(&handle, &host).await?;
        debug!(container = %handle, image = %image, "Version probe started");

        let captured = self.client.attach_capture(&handle).await;

        // Older daemons ignore auto-remove, so always remove explicitly.
        let removal = match self
            .client
            .remove_container(
                handle.id(),
                RemoveOptions {
                    force: true,
                    remove_volumes: false,
                },
            )
            .await
        {
            Err(e) if e.is_not_found() => {
                debug!(container = %handle, "Probe already auto-removed");
                Ok(())
            }
            other => other,
        };

        match (captured, removal) {
            (Ok(output), Ok(())) => {
                info!(image = %image, bytes = output.len(), "Version probe finished");
                Ok(output)
            }
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(removal_err)) => {
                warn!(container = %handle, error = %removal_err, "Failed to remove version probe");
                Err(e)
            }
        }
    }

    async fn resolve_probe_image(&self, reference: &str) -> Result<String> {
        let mut last_err = None;

        for lookup in LOOKUP_ORDER {
            match lookup.resolve(&self.client, reference).await {
                Ok(image) => {
                    debug!(reference = %reference, via = ?lookup, image = %image, "Resolved probe image");
                    return Ok(image);
                }
                Err(e) if e.is_connection() => return Err(e),
                Err(e) => {
                    debug!(reference = %reference, via = ?lookup, error = %e, "Probe lookup failed");
                    last_err = Some(e);
                }
            }
        }

        Err(Error::NotFound {
            op: "find container or image",
            target: reference.to_string(),
            message: last_err
                .map(|e| e.detail().to_string())
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::{ContainerHandle, ContainerInfo};
    use crate::runtime::MockRuntimeClient;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn manager(mock: MockRuntimeClient) -> ContainerManager<MockRuntimeClient> {
        ContainerManager::new(mock, &AppConfig::default())
    }

    fn missing(op: &'static str, target: &str) -> Error {
        Error::NotFound {
            op,
            target: target.to_string(),
            message: "no such object".to_string(),
        }
    }

    fn expect_container_image(mock: &mut MockRuntimeClient, seq: &mut Sequence) {
        mock.expect_inspect_container()
            .withf(|id| id == "weave")
            .times(1)
            .in_sequence(seq)
            .returning(|_| {
                Ok(ContainerInfo {
                    id: "4f2a".to_string(),
                    image: "sha256:9a1c0e".to_string(),
                    config_image: "weaveworks/weave:2.8.1".to_string(),
                    running: true,
                    state: "running".to_string(),
                    ..Default::default()
                })
            });
    }

    #[tokio::test]
    async fn test_probe_full_lifecycle_in_order() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        expect_container_image(&mut mock, &mut seq);
        mock.expect_inspect_image().times(0);
        mock.expect_create_container()
            .withf(|spec, host| {
                spec.image() == "sha256:9a1c0e"
                    && spec.cmd() == ["--version"]
                    && spec.env() == ["WEAVE_CIDR=none"]
                    && spec.network_mode() == Some("none")
                    && spec.auto_remove()
                    && host.auto_remove
                    && host.network_mode.as_deref() == Some("none")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ContainerHandle::new("probe1")));
        mock.expect_start_container()
            .withf(|h, _| h.id() == "probe1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_attach_capture()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(b"weave 2.8.1\n".to_vec()));
        mock.expect_remove_container()
            .withf(|id, opts| id == "probe1" && opts.force)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let output = manager(mock).ask_version("weave").await.unwrap();
        assert_eq!(output, b"weave 2.8.1\n".to_vec());
    }

    #[tokio::test]
    async fn test_probe_removes_even_when_attach_fails() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        expect_container_image(&mut mock, &mut seq);
        mock.expect_create_container()
            .times(1)
            .returning(|_, _| Ok(ContainerHandle::new("probe2")));
        mock.expect_start_container().times(1).returning(|_, _| Ok(()));
        mock.expect_attach_capture().times(1).returning(|h| {
            Err(Error::Operation {
                op: "attach to container",
                target: h.id().to_string(),
                message: "hijack failed".to_string(),
            })
        });
        mock.expect_remove_container()
            .withf(|id, opts| id == "probe2" && opts.force)
            .times(1)
            .returning(|_, _| Ok(()));

        let err = manager(mock).ask_version("weave").await.unwrap_err();
        assert!(matches!(err, Error::Operation { op: "attach to container", .. }));
    }

    #[tokio::test]
    async fn test_probe_keeps_attach_error_when_removal_also_fails() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        expect_container_image(&mut mock, &mut seq);
        mock.expect_create_container()
            .returning(|_, _| Ok(ContainerHandle::new("probe3")));
        mock.expect_start_container().returning(|_, _| Ok(()));
        mock.expect_attach_capture().returning(|h| {
            Err(Error::Connection {
                op: "attach to container",
                target: h.id().to_string(),
                message: "broken pipe".to_string(),
            })
        });
        mock.expect_remove_container().times(1).returning(|id, _| {
            Err(Error::Operation {
                op: "remove container",
                target: id.to_string(),
                message: "device busy".to_string(),
            })
        });

        let err = manager(mock).ask_version("weave").await.unwrap_err();
        assert!(matches!(err, Error::Connection { op: "attach to container", .. }));
    }

    #[tokio::test]
    async fn test_probe_reports_removal_failure_after_successful_capture() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        expect_container_image(&mut mock, &mut seq);
        mock.expect_create_container()
            .returning(|_, _| Ok(ContainerHandle::new("probe4")));
        mock.expect_start_container().returning(|_, _| Ok(()));
        mock.expect_attach_capture().returning(|_| Ok(b"2.8.1".to_vec()));
        mock.expect_remove_container().times(1).returning(|id, _| {
            Err(Error::Operation {
                op: "remove container",
                target: id.to_string(),
                message: "device busy".to_string(),
            })
        });

        let err = manager(mock).ask_version("weave").await.unwrap_err();
        assert!(err.to_string().contains("remove container probe4"));
    }

    #[tokio::test]
    async fn test_probe_tolerates_auto_removed_container() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        expect_container_image(&mut mock, &mut seq);
        mock.expect_create_container()
            .returning(|_, _| Ok(ContainerHandle::new("probe5")));
        mock.expect_start_container().returning(|_, _| Ok(()));
        mock.expect_attach_capture().returning(|_| Ok(b"weave 2.8.1\n".to_vec()));
        mock.expect_remove_container()
            .times(1)
            .returning(|id, _| Err(missing("remove container", id)));

        let output = tokio_test::assert_ok!(manager(mock).ask_version("weave").await);
        assert_eq!(output, b"weave 2.8.1\n".to_vec());
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_image_lookup() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        mock.expect_inspect_container()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id| Err(missing("inspect container", id)));
        mock.expect_inspect_image()
            .withf(|id| id == "weaveworks/weaveexec:2.8.1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("sha256:77bd".to_string()));
        mock.expect_create_container()
            .withf(|spec, _| spec.image() == "sha256:77bd")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ContainerHandle::new("probe6")));
        mock.expect_start_container().returning(|_, _| Ok(()));
        mock.expect_attach_capture().returning(|_| Ok(b"weave 2.8.1\n".to_vec()));
        mock.expect_remove_container().times(1).returning(|_, _| Ok(()));

        let output = manager(mock)
            .ask_version("weaveworks/weaveexec:2.8.1")
            .await
            .unwrap();
        assert_eq!(output, b"weave 2.8.1\n".to_vec());
    }

    #[tokio::test]
    async fn test_probe_not_found_when_both_lookups_fail() {
        let mut mock = MockRuntimeClient::new();
        mock.expect_inspect_container()
            .times(1)
            .returning(|id| Err(missing("inspect container", id)));
        mock.expect_inspect_image()
            .times(1)
            .returning(|id| Err(missing("inspect image", id)));
        mock.expect_create_container().times(0);

        let err = manager(mock).ask_version("nothing-here").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "unable to find container or image nothing-here: no such container or image: no such object"
        );
    }

    #[tokio::test]
    async fn test_probe_connection_error_skips_image_lookup() {
        let mut mock = MockRuntimeClient::new();
        mock.expect_inspect_container().times(1).returning(|id| {
            Err(Error::Connection {
                op: "inspect container",
                target: id.to_string(),
                message: "connection refused".to_string(),
            })
        });
        mock.expect_inspect_image().times(0);

        let err = manager(mock).ask_version("weave").await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_probe_start_failure_skips_removal() {
        let mut seq = Sequence::new();
        let mut mock = MockRuntimeClient::new();
        expect_container_image(&mut mock, &mut seq);
        mock.expect_create_container()
            .returning(|_, _| Ok(ContainerHandle::new("probe7")));
        mock.expect_start_container().times(1).returning(|h, _| {
            Err(Error::Operation {
                op: "start container",
                target: h.id().to_string(),
                message: "exec format error".to_string(),
            })
        });
        mock.expect_attach_capture().times(0);
        mock.expect_remove_container().times(0);

        let err = manager(mock).ask_version("weave").await.unwrap_err();
        assert!(matches!(err, Error::Operation { op: "start container", .. }));
    }
}
