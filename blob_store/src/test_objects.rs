pub mod tests {
    use std::fmt;

    use async_trait::async_trait;
    use futures::{stream::BoxStream, StreamExt, TryStreamExt};
    use object_store::{
        memory::InMemory,
        path::Path,
        GetOptions,
        GetResult,
        GetResultPayload,
        ListResult,
        MultipartUpload,
        ObjectMeta,
        ObjectStore,
        PutMultipartOptions,
        PutOptions,
        PutPayload,
        PutResult,
        Result,
    };

    const STORE_NAME: &str = "FailingReadStore";

    /// An in-memory store whose reads break off mid-transfer: the first half
    /// of the first chunk is returned, then the stream fails.
    #[derive(Debug, Default)]
    pub struct FailingReadStore {
        inner: InMemory,
    }

    impl fmt::Display for FailingReadStore {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{STORE_NAME}")
        }
    }

    #[async_trait]
    impl ObjectStore for FailingReadStore {
        async fn put_opts(
            &self,
            location: &Path,
            payload: PutPayload,
            opts: PutOptions,
        ) -> Result<PutResult> {
            self.inner.put_opts(location, payload, opts).await
        }

        async fn put_multipart_opts(
            &self,
            location: &Path,
            opts: PutMultipartOptions,
        ) -> Result<Box<dyn MultipartUpload>> {
            self.inner.put_multipart_opts(location, opts).await
        }

        async fn get_opts(&self, location: &Path, options: GetOptions) -> Result<GetResult> {
            let result = self.inner.get_opts(location, options).await?;
            let meta = result.meta.clone();
            let range = result.range.clone();
            let attributes = result.attributes.clone();
            let stream = result
                .into_stream()
                .take(1)
                .map_ok(|chunk| chunk.slice(..chunk.len() / 2))
                .chain(futures::stream::once(async {
                    Err(object_store::Error::Generic {
                        store: STORE_NAME,
                        source: "connection reset mid-transfer".into(),
                    })
                }))
                .boxed();
            Ok(GetResult {
                payload: GetResultPayload::Stream(stream),
                meta,
                range,
                attributes,
            })
        }

        async fn head(&self, location: &Path) -> Result<ObjectMeta> {
            self.inner.head(location).await
        }

        async fn delete(&self, location: &Path) -> Result<()> {
            self.inner.delete(location).await
        }

        fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, Result<ObjectMeta>> {
            self.inner.list(prefix)
        }

        async fn list_with_delimiter(&self, prefix: Option<&Path>) -> Result<ListResult> {
            self.inner.list_with_delimiter(prefix).await
        }

        async fn copy(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.copy(from, to).await
        }

        async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> Result<()> {
            self.inner.copy_if_not_exists(from, to).await
        }
    }
}
