/// Scale `v` to unit length in place. Near-zero vectors are left as they are.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 {
        for x in v.iter_mut() { *x /= norm; }
    }
}
