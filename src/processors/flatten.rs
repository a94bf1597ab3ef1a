//! Expansion of collection-valued items.

use crate::core::{Item, Options, Output};
use crate::pipeline::Pipeline;
use crate::processors::pooled;

/// Emit one item per element of every upstream collection, in element order.
///
/// Upstream error items are re-emitted once, unexpanded. If the stage is
/// halted mid-collection the remaining elements are dropped.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn flatten<C, T>(opts: Options) -> Pipeline<C, T>
where
    C: IntoIterator<Item = T> + Send + 'static,
    C::IntoIter: Send,
    T: Send + 'static,
{
    pooled(
        "flatten",
        |_, item: Item<C>, out: Output<T>| async move {
            match item {
                Ok(collection) => {
                    for element in collection {
                        if !out.send_value(element).await {
                            break;
                        }
                    }
                }
                Err(e) => {
                    out.send_error(e).await;
                }
            }
        },
        opts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{channel, Context};
    use crate::error::Error;
    use crate::sources::of;
    use crate::util::collect;

    #[tokio::test]
    async fn expands_in_order() {
        let p = of(vec![vec![1, 2], vec![3, 4], vec![5]]).pipe(flatten(Options::new()));

        let got: Vec<i32> = collect(p.generate(Context::new()))
            .await
            .into_iter()
            .map(|i| i.unwrap())
            .collect();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn error_items_are_re_emitted_once() {
        let (tx, rx) = channel::<Vec<i32>>(4);
        tx.send_async(Ok(vec![1])).await.unwrap();
        tx.send_async(Err(Error::custom("bad"))).await.unwrap();
        tx.send_async(Ok(vec![2, 3])).await.unwrap();
        drop(tx);

        let items = collect(flatten(Options::new()).run(Context::new(), rx)).await;
        assert_eq!(items.len(), 4);
        assert!(matches!(items[0], Ok(1)));
        assert!(matches!(&items[1], Err(Error::Custom(m)) if m == "bad"));
        assert!(matches!(items[3], Ok(3)));
    }

    #[tokio::test]
    async fn cancellation_mid_collection_stops_expansion() {
        let ctx = Context::new();
        let (tx, rx) = channel::<Vec<u32>>(1);
        tx.send_async(Ok((0..1000).collect())).await.unwrap();

        let out = flatten(Options::new()).run(ctx.clone(), rx);
        assert!(matches!(out.recv_async().await, Ok(Ok(0))));
        ctx.cancel();

        let rest = collect(out).await;
        let last = rest.last().unwrap();
        assert!(matches!(last, Err(Error::Cancelled)));
        assert!(rest.len() < 1000);
        drop(tx);
    }

    #[tokio::test]
    async fn works_with_any_collection() {
        let p = of(vec!["ab".to_string()])
            .pipe(crate::processors::map(
                |_, s: Item<String>| async move { Ok(s?.chars().collect::<Vec<char>>()) },
                Options::new(),
            ))
            .pipe(flatten(Options::new()));

        let got: Vec<char> = collect(p.generate(Context::new()))
            .await
            .into_iter()
            .map(|i| i.unwrap())
            .collect();
        assert_eq!(got, vec!['a', 'b']);
    }
}
