// Shared memory backend tests for Linux
// Run with: cargo test --test shared_memory -- --nocapture

#[cfg(target_os = "linux")]
mod linux_tests {
    use metered_pipe::Core::{attach_shared_memory, create_shared_memory, shm_path, RawHandle};
    use serial_test::serial;

    fn unique(name: &str) -> String {
        format!("shmtest_{}_{}", name, std::process::id())
    }

    #[test]
    #[serial]
    fn test_create_shared_memory() {
        let size = 4096;
        let name = unique("create");
        let shm = create_shared_memory(size, &name).unwrap();

        assert_eq!(shm.size(), size);
        assert!(!shm.as_ptr().is_null());
        assert!(shm.is_owner());
        assert!(shm_path(&name).exists());

        unsafe {
            let slice = std::slice::from_raw_parts_mut(shm.as_ptr(), size);
            slice[0] = 0x42;
            assert_eq!(slice[0], 0x42);
        }
    }

    #[test]
    #[serial]
    fn test_owner_unlinks_on_drop() {
        let name = unique("unlink");
        let shm = create_shared_memory(1024, &name).unwrap();
        assert!(shm_path(&name).exists());
        drop(shm);
        assert!(!shm_path(&name).exists());
    }

    #[test]
    #[serial]
    fn test_attach_sees_creator_writes() {
        let size = 8192;
        let name = unique("attach");
        let creator = create_shared_memory(size, &name).unwrap();
        let attached = attach_shared_memory(&name, size).unwrap();

        assert_eq!(attached.size(), size);
        assert!(!attached.is_owner());

        unsafe {
            let writer = std::slice::from_raw_parts_mut(creator.as_ptr(), size);
            for (i, byte) in writer.iter_mut().take(100).enumerate() {
                *byte = (i % 256) as u8;
            }

            let reader = std::slice::from_raw_parts(attached.as_ptr(), size);
            for (i, byte) in reader.iter().take(100).enumerate() {
                assert_eq!(*byte, (i % 256) as u8);
            }
        }

        // Dropping the attacher must leave the region in place
        drop(attached);
        assert!(shm_path(&name).exists());
    }

    #[test]
    #[serial]
    fn test_attach_missing_region() {
        let err = attach_shared_memory(&unique("missing"), 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    #[serial]
    fn test_attach_too_small() {
        let name = unique("small");
        let _shm = create_shared_memory(1024, &name).unwrap();
        let err = attach_shared_memory(&name, 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    #[serial]
    fn test_raw_handle() {
        let shm = create_shared_memory(4096, &unique("handle")).unwrap();
        match shm.raw_handle() {
            RawHandle::Fd(fd) => {
                assert!(fd > 0, "File descriptor should be positive");
            }
        }
    }

    #[test]
    #[serial]
    fn test_mmap_zero_initialized() {
        let size = 1024;
        let shm = create_shared_memory(size, &unique("zero")).unwrap();

        unsafe {
            let slice = std::slice::from_raw_parts(shm.as_ptr(), size);
            assert!(slice.iter().all(|&b| b == 0), "Mmap'd memory should be zero-initialized");
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = create_shared_memory(0, &unique("empty")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}

#[cfg(not(target_os = "linux"))]
mod non_linux_tests {
    use metered_pipe::Core::{attach_shared_memory, create_shared_memory};

    #[test]
    fn test_unsupported_platform() {
        let err = create_shared_memory(4096, "test").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_attach_unsupported_platform() {
        let err = attach_shared_memory("test", 4096).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }
}
