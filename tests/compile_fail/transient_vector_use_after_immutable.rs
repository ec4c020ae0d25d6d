use datoms::persistent::TransientVector;

fn main() {
    let mut transient = TransientVector::<i32>::new();
    transient.push_back(1);
    let _snapshot = TransientVector::immutable(transient);
    transient.push_back(2);
}
