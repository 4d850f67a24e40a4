fn main() {
    sable::uci::run();
}
