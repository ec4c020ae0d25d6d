use datoms::persistent::TransientHashMap;

fn main() {
    let mut transient = TransientHashMap::<u64, u64>::new();
    transient.insert(1, 1, 10);
    let _snapshot = TransientHashMap::immutable(transient);
    transient.insert(2, 2, 20);
}
