//! Single-linkage 1D clustering of segments by their representative coordinate.

/// Observation used for 1D clustering.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Obs {
    pub(crate) index: usize,
    pub(crate) param: f32,
    pub(crate) strength: f32,
}

/// Sort by `param` and chain consecutive observations closer than `eps`.
///
/// Clusters whose total strength stays below `min_strength` are dropped.
pub(crate) fn cluster_1d(mut obs: Vec<Obs>, eps: f32, min_strength: f32) -> Vec<Vec<Obs>> {
    if obs.is_empty() {
        return Vec::new();
    }
    obs.sort_by(|a, b| a.param.total_cmp(&b.param).then(a.index.cmp(&b.index)));
    let mut clusters: Vec<Vec<Obs>> = Vec::new();
    let mut cur: Vec<Obs> = Vec::new();
    for o in obs {
        let joins = cur
            .last()
            .map_or(true, |last| (o.param - last.param).abs() <= eps);
        if joins {
            cur.push(o);
        } else {
            flush(&mut clusters, std::mem::take(&mut cur), min_strength);
            cur.push(o);
        }
    }
    flush(&mut clusters, cur, min_strength);
    clusters
}

fn flush(clusters: &mut Vec<Vec<Obs>>, cur: Vec<Obs>, min_strength: f32) {
    if cur.is_empty() {
        return;
    }
    let sum_w: f32 = cur.iter().map(|x| x.strength).sum();
    if sum_w >= min_strength {
        clusters.push(cur);
    }
}
